//! Batch pre-translation over a file's pending rows (spec §4.2
//! "Pre-translation"). Runs as the body of a tracked `Operation`
//! (spec §4.3); the caller (the scheduler) supplies a `ProgressReporter`
//! so this module stays decoupled from the scheduler's own types.

use crate::config::CascadeConfig;
use crate::db::entities::row::RowStatus;
use crate::domain::tm::Tier;
use crate::error::Result;
use crate::tm::engine::TmEngine;
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How many rows are processed before yielding a progress update and
/// checking cancellation (spec §4.3 "typically every ~500 units of
/// work", §5 suspension points).
pub const BATCH_SIZE: usize = 500;

/// A floor below which a cascade hit is not applied — distinct from
/// each tier's own internal threshold, this is the pre-translation
/// policy's final acceptance gate (spec §4.2 "score ≥ configured floor").
#[derive(Debug, Clone, Copy)]
pub struct PretranslateConfig {
    pub cascade: CascadeConfig,
    /// Tiers at or below this rank are eligible to apply (spec §4.2
    /// "tier ≤ configured cap").
    pub max_tier: Tier,
    pub min_score: f32,
}

#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, percent: i32, step_text: Option<String>);
    fn is_cancelled(&self) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PretranslateSummary {
    pub total_rows: usize,
    pub matched: usize,
    pub left_pending: usize,
}

/// Walks `file_id`'s pending rows in `BATCH_SIZE` chunks, applying the
/// cascade to each and persisting hits as `(target, status=translated)`.
/// Rows below threshold are left untouched (spec §4.2).
pub async fn run(
    db: &DatabaseConnection,
    tm: &TmEngine,
    tm_id: Uuid,
    file_id: Uuid,
    config: &PretranslateConfig,
    progress: &dyn ProgressReporter,
) -> Result<PretranslateSummary> {
    use crate::db::entities::row;

    let pending_ids: Vec<Uuid> = row::Entity::find()
        .filter(row::Column::FileId.eq(file_id))
        .filter(row::Column::Status.eq(RowStatus::Pending))
        .order_by_asc(row::Column::Index)
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();

    let total_rows = pending_ids.len();
    let mut summary = PretranslateSummary {
        total_rows,
        ..Default::default()
    };

    if total_rows == 0 {
        progress.report(100, Some("no pending rows".to_string())).await;
        return Ok(summary);
    }

    for (processed, chunk) in pending_ids.chunks(BATCH_SIZE).enumerate() {
        if progress.is_cancelled() {
            break;
        }
        for row_id in chunk {
            let Some(r) = row::Entity::find_by_id(*row_id).one(db).await? else {
                continue;
            };
            match tm.cascade_lookup(tm_id, &r.source, &config.cascade).await {
                Some(m) if m.tier <= config.max_tier && m.score >= config.min_score => {
                    let tier = m.tier;
                    let metadata = merge_pretranslated_tier(r.metadata.clone(), tier);
                    let mut am: row::ActiveModel = r.into();
                    am.target = Set(m.target);
                    am.status = Set(RowStatus::Translated);
                    am.metadata = Set(metadata);
                    am.update(db).await?;
                    summary.matched += 1;
                }
                _ => {
                    summary.left_pending += 1;
                }
            }
        }
        let rows_done = ((processed + 1) * BATCH_SIZE).min(total_rows);
        let percent = ((rows_done * 100) / total_rows.max(1)) as i32;
        progress
            .report(percent, Some(format!("{rows_done}/{total_rows} rows")))
            .await;
    }

    if !progress.is_cancelled() {
        progress.report(100, Some("done".to_string())).await;
    }
    Ok(summary)
}

/// Records which cascade tier produced an applied translation under
/// `metadata.pretranslated_tier`, preserving whatever else was already
/// in the row's metadata.
fn merge_pretranslated_tier(existing: Option<serde_json::Value>, tier: Tier) -> Option<serde_json::Value> {
    let mut obj = match existing {
        Some(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    obj.insert("pretranslated_tier".to_string(), serde_json::to_value(tier).expect("Tier always serializes"));
    Some(serde_json::Value::Object(obj))
}
