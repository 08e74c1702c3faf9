//! `tm.*` request surface (spec §6). Pretranslation is the one
//! operation here that fans out to the scheduler instead of running
//! inline — it is routed through an Operation because cascade lookups
//! across a whole file are the slow path the progress bus exists for.

use crate::context::CoreContext;
use crate::domain::tm::TmMatch;
use crate::error::Result;
use crate::jobs::builtin::PretranslationJob;
use crate::principal::Principal;
use crate::tm::engine::EntryPair;
use crate::tm::pretranslate::PretranslateConfig;
use std::sync::Arc;
use uuid::Uuid;

pub async fn create(ctx: &CoreContext, name: &str, source_lang: &str, target_lang: &str, project_id: Option<Uuid>, description: Option<&str>) -> Result<Uuid> {
    ctx.tm.create_tm(name, source_lang, target_lang, project_id, description).await
}

pub async fn delete(ctx: &CoreContext, tm_id: Uuid) -> Result<()> {
    ctx.tm.delete_tm(tm_id).await
}

pub async fn import(ctx: &CoreContext, tm_id: Uuid, pairs: Vec<EntryPair>) -> Result<usize> {
    ctx.tm.import_entries(tm_id, pairs).await
}

pub async fn activate(ctx: &CoreContext, session_id: Uuid, tm_id: Uuid) -> Result<()> {
    ctx.tm.set_active(session_id, tm_id).await
}

pub async fn deactivate(ctx: &CoreContext, session_id: Uuid) {
    ctx.tm.deactivate(session_id).await
}

pub async fn search(ctx: &CoreContext, tm_id: Uuid, text: &str, k: usize) -> Result<Vec<TmMatch>> {
    ctx.tm.search(tm_id, text, k, ctx.config.tm.threshold_fuzzy, &ctx.config.tm).await
}

/// Submits a pretranslation run as a tracked `Operation` (spec §6
/// `tm.pretranslate(file_id, engine_id)`); returns the `op_id` to
/// subscribe to via `ops.subscribe`. `engine_id` in the spec's naming
/// is this crate's `tm_id` — one TM is the pretranslation engine.
pub async fn pretranslate(ctx: &CoreContext, principal: &Principal, tm_id: Uuid, file_id: Uuid, config: PretranslateConfig) -> Result<Uuid> {
    let job = Arc::new(PretranslationJob {
        db: ctx.primary_db.clone(),
        tm: ctx.tm.clone(),
        tm_id,
        file_id,
        config,
    });
    ctx.scheduler.submit(principal, job).await
}
