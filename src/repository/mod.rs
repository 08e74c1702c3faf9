//! The backend-agnostic repository contract (spec §4.1, design note
//! "runtime polymorphism over repositories"): a fixed set of async
//! operations, implemented once per backend. Callers hold
//! `Arc<dyn Repository>` and never branch on which backend they got.

mod authoritative;
pub mod engine;
mod local;

pub use authoritative::AuthoritativeBackend;
pub use local::LocalBackend;

use crate::db::entities::{file::FileFormat, row::RowStatus, trash_item::TrashItemType};
use crate::domain::{HierarchyNode, NewRow, RowEdit, TrashEntry};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Where a hierarchy operation is rooted or targeted. `Root` lists
/// platforms plus unassigned projects; the others are unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    Root,
    Platform(Uuid),
    Project(Uuid),
    Folder(Uuid),
}

/// Where `restore` actually placed an item, which may differ from its
/// original location if an ancestor no longer exists (spec §4.1 `restore`).
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub item_id: Uuid,
    pub landed_parent: ParentRef,
    pub renamed_to: Option<String>,
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_children(&self, principal: &crate::principal::Principal, parent: ParentRef) -> Result<Vec<HierarchyNode>>;

    async fn create_platform(
        &self,
        principal: &crate::principal::Principal,
        name: &str,
        description: Option<&str>,
        is_restricted: bool,
    ) -> Result<Uuid>;

    async fn create_project(
        &self,
        principal: &crate::principal::Principal,
        name: &str,
        platform_id: Option<Uuid>,
        is_restricted: bool,
    ) -> Result<Uuid>;

    async fn create_folder(
        &self,
        principal: &crate::principal::Principal,
        name: &str,
        project_id: Uuid,
        parent_folder_id: Option<Uuid>,
    ) -> Result<Uuid>;

    async fn create_file(
        &self,
        principal: &crate::principal::Principal,
        name: &str,
        project_id: Uuid,
        folder_id: Option<Uuid>,
        format: FileFormat,
    ) -> Result<Uuid>;

    async fn rename(
        &self,
        principal: &crate::principal::Principal,
        kind: crate::domain::EntityKind,
        id: Uuid,
        new_name: &str,
    ) -> Result<()>;

    async fn move_item(
        &self,
        principal: &crate::principal::Principal,
        kind: crate::domain::EntityKind,
        id: Uuid,
        new_parent: ParentRef,
    ) -> Result<()>;

    async fn move_cross_project(
        &self,
        principal: &crate::principal::Principal,
        kind: crate::domain::EntityKind,
        id: Uuid,
        new_project_id: Uuid,
        new_parent: ParentRef,
    ) -> Result<()>;

    async fn copy(
        &self,
        principal: &crate::principal::Principal,
        kind: crate::domain::EntityKind,
        id: Uuid,
        new_parent: ParentRef,
    ) -> Result<Uuid>;

    async fn soft_delete(
        &self,
        principal: &crate::principal::Principal,
        kind: crate::domain::EntityKind,
        id: Uuid,
    ) -> Result<Uuid>;

    async fn restore(&self, principal: &crate::principal::Principal, trash_id: Uuid) -> Result<RestoreOutcome>;

    async fn purge(&self, principal: &crate::principal::Principal, trash_id: Uuid) -> Result<()>;

    async fn purge_expired(&self) -> Result<usize>;

    async fn list_trash(&self, principal: &crate::principal::Principal) -> Result<Vec<TrashEntry>>;

    async fn get_row(&self, principal: &crate::principal::Principal, row_id: Uuid) -> Result<crate::db::entities::row::Model>;

    async fn list_rows(&self, principal: &crate::principal::Principal, file_id: Uuid) -> Result<Vec<crate::db::entities::row::Model>>;

    async fn edit_row(
        &self,
        principal: &crate::principal::Principal,
        row_id: Uuid,
        patch: RowEdit,
    ) -> Result<crate::db::entities::row::Model>;

    async fn bulk_upsert_rows(
        &self,
        principal: &crate::principal::Principal,
        file_id: Uuid,
        rows: Vec<NewRow>,
    ) -> Result<usize>;
}

/// Shape recorded in `TrashItem::item_type`, derived from `EntityKind`
/// restricted to the container/leaf kinds the trash can hold.
pub(crate) fn trash_item_type(kind: crate::domain::EntityKind) -> TrashItemType {
    match kind {
        crate::domain::EntityKind::Platform => TrashItemType::Platform,
        crate::domain::EntityKind::Project => TrashItemType::Project,
        crate::domain::EntityKind::Folder => TrashItemType::Folder,
        crate::domain::EntityKind::File => TrashItemType::File,
    }
}

pub(crate) fn default_metadata() -> Value {
    Value::Null
}

pub(crate) fn row_status_default() -> RowStatus {
    RowStatus::Pending
}
