//! `ops.*` request surface (spec §6, §4.3 "Subscriptions").

use crate::context::CoreContext;
use crate::db::entities::operation;
use crate::error::Result;
use crate::jobs::types::ProgressUpdate;
use crate::principal::Principal;
use tokio::sync::broadcast;
use uuid::Uuid;

pub async fn list(ctx: &CoreContext, principal: &Principal) -> Result<Vec<operation::Model>> {
    ctx.scheduler.list_for_user(principal.principal_id).await
}

pub async fn get(ctx: &CoreContext, op_id: Uuid) -> Result<operation::Model> {
    ctx.scheduler.get(op_id).await
}

pub async fn cancel(ctx: &CoreContext, op_id: Uuid) -> Result<()> {
    ctx.scheduler.cancel(op_id).await
}

/// Subscribes to one op's progress stream from `since_seq` onward
/// (spec §8 "Operation reconnect": exactly the updates with seq > S,
/// in order, no duplicates). Returns the replay backlog plus a live
/// receiver for everything published after the call.
pub fn subscribe(ctx: &CoreContext, op_id: Uuid, since_seq: i64) -> (Vec<ProgressUpdate>, broadcast::Receiver<ProgressUpdate>) {
    ctx.bus.subscribe_topic(op_id, since_seq)
}

/// No server-side state to release — dropping the `broadcast::Receiver`
/// returned by `subscribe` is the unsubscribe.
pub fn unsubscribe(_receiver: broadcast::Receiver<ProgressUpdate>) {}
