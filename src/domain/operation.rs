//! Operation classification and summary DTO (spec §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::entities::operation::OperationState;

/// Class an Operation belongs to; the scheduler enforces per-class
/// concurrency caps and default timeouts keyed on this (spec §4.3,
/// §6 `scheduler.per_class_max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Indexing,
    Pretranslation,
    Upload,
    BulkEdit,
}

impl OperationClass {
    /// Default per-class timeout (spec §4.3: "indexing 1h, pre-translation 2h").
    pub fn default_timeout(self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            Self::Indexing => Duration::from_secs(60 * 60),
            Self::Pretranslation => Duration::from_secs(2 * 60 * 60),
            Self::Upload => Duration::from_secs(60 * 60),
            Self::BulkEdit => Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationInfo {
    pub op_id: Uuid,
    pub user_id: Uuid,
    pub tool: String,
    pub function: String,
    pub display_name: String,
    pub state: OperationState,
    pub progress: i32,
    pub step_text: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
}
