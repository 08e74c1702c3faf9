//! Live progress bus (spec §4.3 "Subscriptions", "Ordering guarantees",
//! "Reconnect"). Three subscriber kinds share one mechanism: a
//! per-op broadcast channel plus a bounded replay buffer, so a topic
//! (reconnect) subscriber and an owner/admin subscriber both just
//! filter the same stream of updates differently.

use crate::jobs::types::ProgressUpdate;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Updates kept per op for reconnect replay. Bounded generously —
/// a 10k-row pretranslation yields roughly one update per batch of
/// 500 rows plus the terminal update, nowhere near this cap.
const REPLAY_BUFFER_CAP: usize = 4096;
const CHANNEL_CAPACITY: usize = 1024;

struct OpStream {
    history: VecDeque<ProgressUpdate>,
    sender: broadcast::Sender<ProgressUpdate>,
}

impl OpStream {
    fn new() -> Self {
        let (sender, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            history: VecDeque::new(),
            sender,
        }
    }
}

pub struct ProgressBus {
    ops: Mutex<HashMap<Uuid, OpStream>>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBus {
    pub fn new() -> Self {
        Self { ops: Mutex::new(HashMap::new()) }
    }

    /// Publishes one update. Ordering for a single op is guaranteed by
    /// the caller: only the worker task owning that op ever publishes
    /// to it, so there is no interleaving to protect against here
    /// beyond holding the per-op mutex section for the push itself.
    pub fn publish(&self, update: ProgressUpdate) {
        let mut ops = self.ops.lock().unwrap();
        let stream = ops.entry(update.op_id).or_insert_with(OpStream::new);
        if stream.history.len() >= REPLAY_BUFFER_CAP {
            stream.history.pop_front();
        }
        stream.history.push_back(update.clone());
        let _ = stream.sender.send(update);
    }

    /// Topic subscription used for reconnect: replays buffered updates
    /// with `seq > since_seq` then yields the live receiver (spec §4.3
    /// "replays the latest state... plus any updates newer than a
    /// client-supplied sequence number").
    pub fn subscribe_topic(&self, op_id: Uuid, since_seq: i64) -> (Vec<ProgressUpdate>, broadcast::Receiver<ProgressUpdate>) {
        let mut ops = self.ops.lock().unwrap();
        let stream = ops.entry(op_id).or_insert_with(OpStream::new);
        let backlog = stream.history.iter().filter(|u| u.seq > since_seq).cloned().collect();
        (backlog, stream.sender.subscribe())
    }

    /// Owner stream: every update for ops owned by `user_id`. Since
    /// there is no single channel spanning all ops, the caller gets one
    /// receiver per currently-known op plus is expected to call this
    /// again when a new op starts; `Scheduler::submit` registers new
    /// ops with the bus before spawning so a subscriber polling
    /// `owned_op_ids` never misses an op's first update.
    pub fn owned_op_ids(&self, owner_of: impl Fn(Uuid) -> Option<Uuid>, user_id: Uuid) -> Vec<Uuid> {
        let ops = self.ops.lock().unwrap();
        ops.keys().copied().filter(|op_id| owner_of(*op_id) == Some(user_id)).collect()
    }

    pub fn all_op_ids(&self) -> Vec<Uuid> {
        self.ops.lock().unwrap().keys().copied().collect()
    }

    /// Drops history for an op past retention (spec §4.3 "Retention
    /// for completed ops is 7 days"); called by the scheduler's sweep.
    pub fn forget(&self, op_id: Uuid) {
        self.ops.lock().unwrap().remove(&op_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::operation::OperationState;
    use chrono::Utc;

    fn update(op_id: Uuid, seq: i64, percent: i32, state: OperationState) -> ProgressUpdate {
        ProgressUpdate {
            op_id,
            user_id: Uuid::new_v4(),
            seq,
            state,
            percent,
            step_text: None,
            metadata: None,
            error: None,
            result: None,
            published_at: Utc::now(),
        }
    }

    /// Spec §8: "for any reconnect at sequence number S, the client
    /// receives exactly the updates with sequence > S... in order,
    /// with no duplicates".
    #[test]
    fn reconnect_replays_only_updates_after_since_seq() {
        let bus = ProgressBus::new();
        let op_id = Uuid::new_v4();
        for seq in 1..=5 {
            bus.publish(update(op_id, seq, seq as i32 * 20, OperationState::Running));
        }

        let (backlog, _rx) = bus.subscribe_topic(op_id, 2);
        let seqs: Vec<i64> = backlog.iter().map(|u| u.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
    }

    #[test]
    fn subscribe_topic_before_any_publish_yields_empty_backlog() {
        let bus = ProgressBus::new();
        let op_id = Uuid::new_v4();
        let (backlog, _rx) = bus.subscribe_topic(op_id, 0);
        assert!(backlog.is_empty());
    }

    #[test]
    fn forget_drops_history() {
        let bus = ProgressBus::new();
        let op_id = Uuid::new_v4();
        bus.publish(update(op_id, 1, 100, OperationState::Completed));
        bus.forget(op_id);
        let (backlog, _rx) = bus.subscribe_topic(op_id, 0);
        assert!(backlog.is_empty());
    }
}
