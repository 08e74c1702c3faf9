//! Row creation/edit payloads (spec §3 Row, §4.1 `edit_row`/`bulk_upsert_rows`).

use crate::db::entities::row::RowStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRow {
    /// 1-based position; `bulk_upsert_rows` upserts by `(file_id, index)`.
    pub index: i32,
    pub source: String,
    pub target: String,
    pub status: RowStatus,
    pub string_id: Option<String>,
    pub metadata: Option<Value>,
}

/// Partial update applied by `edit_row`. `None` fields are left
/// untouched; `source` is rare (merge-driven) and, when present,
/// forces the TM index position for this row to be recomputed lazily.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowEdit {
    pub source: Option<String>,
    pub target: Option<String>,
    pub status: Option<RowStatus>,
    pub metadata: Option<Value>,
}
