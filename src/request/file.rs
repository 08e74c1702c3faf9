//! `file.*` request surface (spec §6). File-format codecs
//! (`.txt/.tsv/.xlsx/.xls/.xml/.tmx` parsing and writing) are an
//! explicit external collaborator (spec §1 Non-goals): these
//! functions operate on rows already decoded by that layer, or hand
//! rows back for it to encode. `convert`, `merge`,
//! `extract_glossary` and `run_qa` live entirely in that external
//! codec/QA-compiler layer and have no core counterpart.

use crate::context::CoreContext;
use crate::db::entities::file::FileFormat;
use crate::domain::NewRow;
use crate::error::Result;
use crate::principal::Principal;
use crate::repository::Repository;
use crate::tm::engine::EntryPair;
use uuid::Uuid;

/// `file.upload` — creates the file and writes its decoded rows in
/// one call.
pub async fn upload(
    ctx: &CoreContext,
    principal: &Principal,
    name: &str,
    project_id: Uuid,
    folder_id: Option<Uuid>,
    format: FileFormat,
    rows: Vec<NewRow>,
) -> Result<Uuid> {
    let file_id = ctx.primary.create_file(principal, name, project_id, folder_id, format).await?;
    ctx.primary.bulk_upsert_rows(principal, file_id, rows).await?;
    Ok(file_id)
}

/// `file.download` — hands the caller's codec layer the rows to encode.
pub async fn download(ctx: &CoreContext, principal: &Principal, file_id: Uuid) -> Result<Vec<crate::db::entities::row::Model>> {
    ctx.primary.list_rows(principal, file_id).await
}

/// `file.register_as_tm` — imports an existing file's `(source,
/// target)` pairs into a TM as entries, skipping rows with an empty
/// target (nothing to learn from those).
pub async fn register_as_tm(ctx: &CoreContext, principal: &Principal, file_id: Uuid, tm_id: Uuid) -> Result<usize> {
    let rows = ctx.primary.list_rows(principal, file_id).await?;
    let pairs: Vec<EntryPair> = rows
        .into_iter()
        .filter(|r| !r.target.trim().is_empty())
        .map(|r| EntryPair { source: r.source, target: r.target })
        .collect();
    ctx.tm.import_entries(tm_id, pairs).await
}
