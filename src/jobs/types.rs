//! Wire types for the progress bus (spec §4.3 "Progress contract").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::db::entities::operation::OperationState;
pub use crate::domain::operation::{OperationClass, OperationInfo};

/// One update published to the bus. `seq` is per-op monotonic,
/// starting at 1, and is what the reconnect protocol dedupes and
/// filters on (spec §4.3 "Reconnect", §8 "no duplicates after
/// deduplication by `(op_id, seq)`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub op_id: Uuid,
    pub user_id: Uuid,
    pub seq: i64,
    pub state: OperationState,
    pub percent: i32,
    pub step_text: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub published_at: DateTime<Utc>,
}
