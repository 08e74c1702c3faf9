//! `offline.*` request surface (spec §6): the same hierarchy
//! operations as `request::hierarchy`, scoped unconditionally to the
//! local sandbox (`ctx.local`) regardless of `config.database.mode`.

use crate::context::CoreContext;
use crate::db::entities::file::FileFormat;
use crate::domain::{EntityKind, HierarchyNode};
use crate::error::Result;
use crate::principal::Principal;
use crate::repository::{ParentRef, Repository};
use crate::sync::offline::EmptyTrashReport;
use uuid::Uuid;

pub async fn create_folder(ctx: &CoreContext, principal: &Principal, name: &str, project_id: Uuid, parent_folder_id: Option<Uuid>) -> Result<Uuid> {
    ctx.local.create_folder(principal, name, project_id, parent_folder_id).await
}

pub async fn upload_file(ctx: &CoreContext, principal: &Principal, name: &str, project_id: Uuid, folder_id: Option<Uuid>, format: FileFormat) -> Result<Uuid> {
    ctx.local.create_file(principal, name, project_id, folder_id, format).await
}

pub async fn list(ctx: &CoreContext, principal: &Principal, parent: ParentRef) -> Result<Vec<HierarchyNode>> {
    ctx.local.list_children(principal, parent).await
}

pub async fn move_item(ctx: &CoreContext, principal: &Principal, kind: EntityKind, id: Uuid, new_parent: ParentRef) -> Result<()> {
    ctx.local.move_item(principal, kind, id, new_parent).await
}

pub async fn rename(ctx: &CoreContext, principal: &Principal, kind: EntityKind, id: Uuid, new_name: &str) -> Result<()> {
    ctx.local.rename(principal, kind, id, new_name).await
}

pub async fn delete(ctx: &CoreContext, principal: &Principal, kind: EntityKind, id: Uuid) -> Result<Uuid> {
    ctx.local.soft_delete(principal, kind, id).await
}

/// Local-only empty trash. `request::sync::empty_recycle_bin` is the
/// cross-store variant (spec §8 scenario 6).
pub async fn empty_trash(ctx: &CoreContext, principal: &Principal) -> Result<EmptyTrashReport> {
    crate::request::sync::empty_recycle_bin(ctx, principal).await
}
