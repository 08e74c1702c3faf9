//! Trash listing payload (spec §3 TrashItem, §4.1 `list_trash`).

use crate::db::entities::trash_item::TrashItemType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashEntry {
    pub trash_id: Uuid,
    pub item_type: TrashItemType,
    pub item_id: Uuid,
    pub item_name: String,
    pub deleted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
