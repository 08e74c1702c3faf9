//! `row.*` request surface (spec §6).

use crate::context::CoreContext;
use crate::db::entities::row;
use crate::domain::{NewRow, RowEdit};
use crate::error::Result;
use crate::principal::Principal;
use crate::repository::Repository;
use uuid::Uuid;

pub async fn get(ctx: &CoreContext, principal: &Principal, row_id: Uuid) -> Result<row::Model> {
    ctx.primary.get_row(principal, row_id).await
}

pub async fn list(ctx: &CoreContext, principal: &Principal, file_id: Uuid) -> Result<Vec<row::Model>> {
    ctx.primary.list_rows(principal, file_id).await
}

pub async fn edit(ctx: &CoreContext, principal: &Principal, row_id: Uuid, patch: RowEdit) -> Result<row::Model> {
    ctx.primary.edit_row(principal, row_id, patch).await
}

pub async fn bulk_edit(ctx: &CoreContext, principal: &Principal, file_id: Uuid, rows: Vec<NewRow>) -> Result<usize> {
    ctx.primary.bulk_upsert_rows(principal, file_id, rows).await
}
