//! `hierarchy.*` request surface (spec §6): the thin seam an RPC/HTTP
//! layer sits behind. Each function resolves the right repository off
//! `CoreContext` and forwards — no transport, no wire format, that
//! boundary is intentionally external (spec §1 Non-goals).

use crate::audit::{kind as audit_kind, AuditSink};
use crate::context::CoreContext;
use crate::db::entities::file::FileFormat;
use crate::domain::{EntityKind, HierarchyNode, TrashEntry};
use crate::error::Result;
use crate::principal::Principal;
use crate::repository::{ParentRef, Repository, RestoreOutcome};
use serde_json::json;
use uuid::Uuid;

pub async fn list_children(ctx: &CoreContext, principal: &Principal, parent: ParentRef) -> Result<Vec<HierarchyNode>> {
    ctx.primary.list_children(principal, parent).await
}

pub async fn create_platform(ctx: &CoreContext, principal: &Principal, name: &str, description: Option<&str>, is_restricted: bool) -> Result<Uuid> {
    let id = ctx.primary.create_platform(principal, name, description, is_restricted).await?;
    audit_mutation(&ctx.audit, principal, "platform", id, "create").await;
    Ok(id)
}

pub async fn create_project(ctx: &CoreContext, principal: &Principal, name: &str, platform_id: Option<Uuid>, is_restricted: bool) -> Result<Uuid> {
    let id = ctx.primary.create_project(principal, name, platform_id, is_restricted).await?;
    audit_mutation(&ctx.audit, principal, "project", id, "create").await;
    Ok(id)
}

pub async fn create_folder(ctx: &CoreContext, principal: &Principal, name: &str, project_id: Uuid, parent_folder_id: Option<Uuid>) -> Result<Uuid> {
    let id = ctx.primary.create_folder(principal, name, project_id, parent_folder_id).await?;
    audit_mutation(&ctx.audit, principal, "folder", id, "create").await;
    Ok(id)
}

pub async fn create_file(ctx: &CoreContext, principal: &Principal, name: &str, project_id: Uuid, folder_id: Option<Uuid>, format: FileFormat) -> Result<Uuid> {
    let id = ctx.primary.create_file(principal, name, project_id, folder_id, format).await?;
    audit_mutation(&ctx.audit, principal, "file", id, "create").await;
    Ok(id)
}

pub async fn rename(ctx: &CoreContext, principal: &Principal, kind: EntityKind, id: Uuid, new_name: &str) -> Result<()> {
    ctx.primary.rename(principal, kind, id, new_name).await?;
    audit_mutation(&ctx.audit, principal, "rename", id, new_name).await;
    Ok(())
}

pub async fn move_item(ctx: &CoreContext, principal: &Principal, kind: EntityKind, id: Uuid, new_parent: ParentRef) -> Result<()> {
    ctx.primary.move_item(principal, kind, id, new_parent).await?;
    audit_mutation(&ctx.audit, principal, "move", id, "moved").await;
    Ok(())
}

pub async fn move_cross_project(ctx: &CoreContext, principal: &Principal, kind: EntityKind, id: Uuid, new_project_id: Uuid, new_parent: ParentRef) -> Result<()> {
    ctx.primary.move_cross_project(principal, kind, id, new_project_id, new_parent).await?;
    audit_mutation(&ctx.audit, principal, "move_cross_project", id, "moved").await;
    Ok(())
}

pub async fn copy(ctx: &CoreContext, principal: &Principal, kind: EntityKind, id: Uuid, new_parent: ParentRef) -> Result<Uuid> {
    let new_id = ctx.primary.copy(principal, kind, id, new_parent).await?;
    audit_mutation(&ctx.audit, principal, "copy", new_id, "copied").await;
    Ok(new_id)
}

pub async fn soft_delete(ctx: &CoreContext, principal: &Principal, kind: EntityKind, id: Uuid) -> Result<Uuid> {
    let trash_id = ctx.primary.soft_delete(principal, kind, id).await?;
    ctx.audit.record_for(audit_kind::HIERARCHY_MUTATED, principal, json!({ "action": "soft_delete", "id": id, "trash_id": trash_id })).await;
    Ok(trash_id)
}

pub async fn restore(ctx: &CoreContext, principal: &Principal, trash_id: Uuid) -> Result<RestoreOutcome> {
    let outcome = ctx.primary.restore(principal, trash_id).await?;
    ctx.audit.record_for(audit_kind::TRASH_RESTORED, principal, json!({ "trash_id": trash_id, "landed_item_id": outcome.item_id })).await;
    Ok(outcome)
}

pub async fn purge(ctx: &CoreContext, principal: &Principal, trash_id: Uuid) -> Result<()> {
    ctx.primary.purge(principal, trash_id).await?;
    ctx.audit.record_for(audit_kind::TRASH_PURGED, principal, json!({ "trash_id": trash_id })).await;
    Ok(())
}

pub async fn list_trash(ctx: &CoreContext, principal: &Principal) -> Result<Vec<TrashEntry>> {
    ctx.primary.list_trash(principal).await
}

/// `hierarchy.empty_trash` (spec §6) against the primary store only;
/// `sync.empty_recycle_bin` covers both stores at once for a desktop
/// client that holds an Offline Storage sandbox.
pub async fn empty_trash(ctx: &CoreContext, principal: &Principal) -> Result<usize> {
    let entries = ctx.primary.list_trash(principal).await?;
    let mut purged = 0;
    for entry in entries {
        ctx.primary.purge(principal, entry.trash_id).await?;
        purged += 1;
    }
    ctx.audit.record_for(audit_kind::TRASH_PURGED, principal, json!({ "count": purged })).await;
    Ok(purged)
}

async fn audit_mutation(audit: &AuditSink, principal: &Principal, action: &str, id: Uuid, detail: impl Into<String>) {
    audit.record_for(audit_kind::HIERARCHY_MUTATED, principal, json!({ "action": action, "id": id, "detail": detail.into() })).await;
}
