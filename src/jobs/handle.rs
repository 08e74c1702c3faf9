//! The handle passed into a running job: its only way to report
//! progress, check cancellation, and learn its own identity (spec
//! §4.3 "a worker must publish at least one update per second...").

use crate::db::entities::operation::{self, OperationState};
use crate::error::Result;
use crate::jobs::bus::ProgressBus;
use crate::jobs::types::ProgressUpdate;
use crate::tm::pretranslate::ProgressReporter;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub struct OperationHandle {
    pub op_id: Uuid,
    pub user_id: Uuid,
    db: DatabaseConnection,
    bus: Arc<ProgressBus>,
    cancelled: Arc<AtomicBool>,
    seq: AtomicI64,
}

impl OperationHandle {
    pub fn new(op_id: Uuid, user_id: Uuid, db: DatabaseConnection, bus: Arc<ProgressBus>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            op_id,
            user_id,
            db,
            bus,
            cancelled,
            seq: AtomicI64::new(0),
        }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Persists and publishes a non-terminal progress update. Percent
    /// must be monotonic within an op (spec §8); callers are trusted to
    /// pass increasing values, since only one worker task ever writes
    /// to a given op.
    pub async fn update(&self, percent: i32, step_text: Option<String>, metadata: Option<serde_json::Value>) -> Result<()> {
        self.publish(OperationState::Running, percent, step_text, metadata, None, None).await
    }

    pub async fn complete(&self, result: serde_json::Value) -> Result<()> {
        self.publish(OperationState::Completed, 100, Some("completed".into()), None, None, Some(result)).await
    }

    pub async fn fail(&self, error: serde_json::Value) -> Result<()> {
        self.publish(OperationState::Failed, 100, None, None, Some(error), None).await
    }

    pub async fn mark_cancelled(&self) -> Result<()> {
        self.publish(OperationState::Cancelled, 100, Some("cancelled".into()), None, None, None).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn publish(
        &self,
        state: OperationState,
        percent: i32,
        step_text: Option<String>,
        metadata: Option<serde_json::Value>,
        error: Option<serde_json::Value>,
        result: Option<serde_json::Value>,
    ) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();

        if let Some(existing) = operation::Entity::find_by_id(self.op_id).one(&self.db).await? {
            let mut am: operation::ActiveModel = existing.into();
            am.state = Set(state);
            am.progress = Set(percent);
            am.step_text = Set(step_text.clone());
            am.error = Set(error.clone());
            am.result = Set(result.clone());
            am.last_seq = Set(seq);
            if state.is_terminal() {
                am.completed_at = Set(Some(now));
            }
            am.update(&self.db).await?;
        }

        self.bus.publish(ProgressUpdate {
            op_id: self.op_id,
            user_id: self.user_id,
            seq,
            state,
            percent,
            step_text,
            metadata,
            error,
            result,
            published_at: now,
        });
        Ok(())
    }
}

#[async_trait]
impl ProgressReporter for OperationHandle {
    async fn report(&self, percent: i32, step_text: Option<String>) {
        let _ = self.update(percent, step_text, None).await;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
