//! TrashItem entity — soft-delete record (spec §3).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum TrashItemType {
    #[sea_orm(string_value = "platform")]
    Platform,
    #[sea_orm(string_value = "project")]
    Project,
    #[sea_orm(string_value = "folder")]
    Folder,
    #[sea_orm(string_value = "file")]
    File,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trash_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub trash_id: Uuid,
    pub item_type: TrashItemType,
    pub item_id: Uuid,
    pub item_name: String,
    pub parent_project_id: Option<Uuid>,
    pub parent_folder_id: Option<Uuid>,
    /// Snapshot of the subtree at delete time (rows/folders/files),
    /// opaque JSON so `restore` can recreate it without re-deriving
    /// structure from a live tree that no longer has it.
    pub snapshot: Json,
    pub deleted_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
