//! `sync.*` request surface (spec §6).

use crate::context::CoreContext;
use crate::db::entities::sync_subscription::{self, SubscriptionItemType};
use crate::error::{Error, Result};
use crate::principal::Principal;
use crate::repository::Repository;
use crate::sync::{offline, pull, push};
use sea_orm::EntityTrait;
use uuid::Uuid;

pub async fn subscribe(ctx: &CoreContext, principal: &Principal, item_type: SubscriptionItemType, item_id: Uuid) -> Result<Uuid> {
    crate::sync::subscription::subscribe(&ctx.local_db, principal.principal_id, item_type, item_id).await
}

pub async fn unsubscribe(ctx: &CoreContext, subscription_id: Uuid) -> Result<()> {
    crate::sync::subscription::unsubscribe(&ctx.local_db, subscription_id).await
}

pub async fn list_subscriptions(ctx: &CoreContext, principal: &Principal) -> Result<Vec<sync_subscription::Model>> {
    crate::sync::subscription::list_subscriptions(&ctx.local_db, principal.principal_id).await
}

/// `sync.pull(subscription_id)` — runs an initial snapshot the first
/// time, a delta thereafter (spec §4.4).
pub async fn pull_subscription(ctx: &CoreContext, principal: &Principal, subscription_id: Uuid) -> Result<()> {
    let central = ctx
        .central
        .as_ref()
        .ok_or_else(|| Error::precondition("no authoritative connection configured, cannot pull"))?;
    let central_db = ctx.central_db.as_ref().expect("central present implies central_db present");

    let sub = sync_subscription::Entity::find_by_id(subscription_id)
        .one(&ctx.local_db)
        .await?
        .ok_or_else(|| Error::not_found(format!("subscription {subscription_id}")))?;

    match sub.last_synced_at {
        None => {
            pull::pull_initial_snapshot(central_db, central, &ctx.local, principal, sub.item_type, sub.item_id).await?;
        }
        Some(since) => {
            if sub.item_type == SubscriptionItemType::File {
                pull::pull_delta(central_db, central, &ctx.local, principal, sub.item_id, sub.item_id, since).await?;
            }
        }
    }
    crate::sync::subscription::mark_synced(&ctx.local_db, subscription_id).await
}

/// `sync.push(file_id, dest_project_id)` — promotes a local file to
/// the authoritative store (spec §4.4, §8 scenario 5).
pub async fn push_file(ctx: &CoreContext, principal: &Principal, local_file_id: Uuid, dest_project_id: Uuid, dest_folder_id: Option<Uuid>) -> Result<Uuid> {
    use crate::audit::kind as audit_kind;
    let central = ctx
        .central
        .as_ref()
        .ok_or_else(|| Error::precondition("no authoritative connection configured, cannot push"))?;

    let summary = push::upload_to_central(&ctx.local_db, &ctx.local, central, principal, local_file_id, dest_project_id, dest_folder_id).await?;
    ctx.audit
        .record_for(audit_kind::SYNC_PROMOTED, principal, serde_json::json!({ "local_file_id": local_file_id, "central_file_id": summary.central_file_id }))
        .await;
    Ok(summary.central_file_id)
}

/// Cross-store "empty recycle bin" (spec §8 scenario 6). Only
/// meaningful once a central connection exists; with none configured
/// this degrades to emptying the local trash alone.
pub async fn empty_recycle_bin(ctx: &CoreContext, principal: &Principal) -> Result<offline::EmptyTrashReport> {
    match &ctx.central {
        Some(central) => offline::empty_recycle_bin(&ctx.local, central, principal).await,
        None => {
            let local_only = offline_only_empty(&ctx.local, principal).await;
            Ok(offline::EmptyTrashReport {
                local: local_only,
                central: offline::StoreEmptyResult { purged: 0, failed: None },
            })
        }
    }
}

async fn offline_only_empty(local: &std::sync::Arc<dyn crate::repository::Repository>, principal: &Principal) -> offline::StoreEmptyResult {
    let entries = match local.list_trash(principal).await {
        Ok(e) => e,
        Err(e) => return offline::StoreEmptyResult { purged: 0, failed: Some(e.to_string()) },
    };
    let mut purged = 0;
    for entry in entries {
        if local.purge(principal, entry.trash_id).await.is_err() {
            return offline::StoreEmptyResult { purged, failed: Some("local".to_string()) };
        }
        purged += 1;
    }
    offline::StoreEmptyResult { purged, failed: None }
}
