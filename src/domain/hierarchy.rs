//! Hierarchy node kinds shared by `repository` operations (spec §4.1).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Platform,
    Project,
    Folder,
    File,
}

/// One node returned by `list_children`, shaped for display — enough
/// to render a tree entry without a second round trip per kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub kind: EntityKind,
    pub id: Uuid,
    pub name: String,
    pub parent_project_id: Option<Uuid>,
    pub parent_folder_id: Option<Uuid>,
}
