//! Shared query logic for both backends. Every function here takes a
//! `&DatabaseConnection` (or an open transaction) so `AuthoritativeBackend`
//! calls straight through while `LocalBackend` routes writes through its
//! single-writer gate first — neither backend duplicates this logic.

use crate::db::entities::{file, folder, operation::OperationState, platform, project, row, tm, trash_item};
use crate::domain::{EntityKind, HierarchyNode, NewRow, RowEdit, TrashEntry};
use crate::error::{Error, Result};
use crate::principal::Principal;
use crate::repository::{trash_item_type, ParentRef, RestoreOutcome};
use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

fn check_project_access(principal: &Principal, project_id: Uuid) -> Result<()> {
    if principal.can_access_project(project_id) {
        Ok(())
    } else {
        Err(Error::forbidden(format!("no access to project {project_id}")))
    }
}

pub async fn list_children(
    db: &DatabaseConnection,
    principal: &Principal,
    parent: ParentRef,
) -> Result<Vec<HierarchyNode>> {
    match parent {
        ParentRef::Root => {
            let mut nodes = Vec::new();
            let platforms = platform::Entity::find()
                .order_by_asc(platform::Column::Name)
                .all(db)
                .await?;
            for p in platforms {
                nodes.push(HierarchyNode {
                    kind: EntityKind::Platform,
                    id: p.id,
                    name: p.name,
                    parent_project_id: None,
                    parent_folder_id: None,
                });
            }
            let unassigned = project::Entity::find()
                .filter(project::Column::PlatformId.is_null())
                .order_by_asc(project::Column::Name)
                .all(db)
                .await?;
            for p in unassigned {
                if principal.can_access_project(p.id) {
                    nodes.push(HierarchyNode {
                        kind: EntityKind::Project,
                        id: p.id,
                        name: p.name,
                        parent_project_id: None,
                        parent_folder_id: None,
                    });
                }
            }
            Ok(nodes)
        }
        ParentRef::Platform(platform_id) => {
            if !principal.can_access_platform(platform_id) {
                return Err(Error::forbidden(format!("no access to platform {platform_id}")));
            }
            platform::Entity::find_by_id(platform_id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("platform {platform_id}")))?;
            let projects = project::Entity::find()
                .filter(project::Column::PlatformId.eq(platform_id))
                .order_by_asc(project::Column::Name)
                .all(db)
                .await?;
            Ok(projects
                .into_iter()
                .filter(|p| principal.can_access_project(p.id))
                .map(|p| HierarchyNode {
                    kind: EntityKind::Project,
                    id: p.id,
                    name: p.name,
                    parent_project_id: None,
                    parent_folder_id: None,
                })
                .collect())
        }
        ParentRef::Project(project_id) => {
            check_project_access(principal, project_id)?;
            project::Entity::find_by_id(project_id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("project {project_id}")))?;
            let mut nodes = Vec::new();
            let folders = folder::Entity::find()
                .filter(folder::Column::ProjectId.eq(project_id))
                .filter(folder::Column::ParentFolderId.is_null())
                .all(db)
                .await?;
            for f in folders {
                nodes.push(HierarchyNode {
                    kind: EntityKind::Folder,
                    id: f.id,
                    name: f.name,
                    parent_project_id: Some(project_id),
                    parent_folder_id: None,
                });
            }
            let files = file::Entity::find()
                .filter(file::Column::ProjectId.eq(project_id))
                .filter(file::Column::FolderId.is_null())
                .all(db)
                .await?;
            for f in files {
                nodes.push(HierarchyNode {
                    kind: EntityKind::File,
                    id: f.id,
                    name: f.name,
                    parent_project_id: Some(project_id),
                    parent_folder_id: None,
                });
            }
            Ok(nodes)
        }
        ParentRef::Folder(folder_id) => {
            let parent_folder = folder::Entity::find_by_id(folder_id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("folder {folder_id}")))?;
            check_project_access(principal, parent_folder.project_id)?;
            let mut nodes = Vec::new();
            let folders = folder::Entity::find()
                .filter(folder::Column::ParentFolderId.eq(folder_id))
                .all(db)
                .await?;
            for f in folders {
                nodes.push(HierarchyNode {
                    kind: EntityKind::Folder,
                    id: f.id,
                    name: f.name,
                    parent_project_id: Some(f.project_id),
                    parent_folder_id: Some(folder_id),
                });
            }
            let files = file::Entity::find()
                .filter(file::Column::FolderId.eq(folder_id))
                .all(db)
                .await?;
            for f in files {
                nodes.push(HierarchyNode {
                    kind: EntityKind::File,
                    id: f.id,
                    name: f.name,
                    parent_project_id: Some(f.project_id),
                    parent_folder_id: Some(folder_id),
                });
            }
            Ok(nodes)
        }
    }
}

pub async fn create_platform(
    db: &DatabaseConnection,
    name: &str,
    description: Option<&str>,
    is_restricted: bool,
) -> Result<Uuid> {
    if name.trim().is_empty() {
        return Err(Error::invalid("platform name must not be empty"));
    }
    let existing = platform::Entity::find()
        .filter(platform::Column::Name.eq(name))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::conflict(format!("platform '{name}' already exists")));
    }
    let id = Uuid::new_v4();
    platform::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        description: Set(description.map(str::to_string)),
        is_restricted: Set(is_restricted),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(id)
}

pub async fn create_project(
    db: &DatabaseConnection,
    name: &str,
    platform_id: Option<Uuid>,
    is_restricted: bool,
) -> Result<Uuid> {
    if name.trim().is_empty() {
        return Err(Error::invalid("project name must not be empty"));
    }
    if let Some(pid) = platform_id {
        platform::Entity::find_by_id(pid)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found(format!("platform {pid}")))?;
    }
    let mut q = project::Entity::find().filter(project::Column::Name.eq(name));
    q = match platform_id {
        Some(pid) => q.filter(project::Column::PlatformId.eq(pid)),
        None => q.filter(project::Column::PlatformId.is_null()),
    };
    if q.one(db).await?.is_some() {
        return Err(Error::conflict(format!("project '{name}' already exists in this scope")));
    }
    let id = Uuid::new_v4();
    let now = Utc::now();
    project::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        platform_id: Set(platform_id),
        is_restricted: Set(is_restricted),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(id)
}

/// Walks a folder's ancestor chain looking for `target`; used before
/// creating or moving a folder to reject a cycle (spec §3 Folder
/// invariant, §4.1 `move`).
async fn would_cycle(db: &DatabaseConnection, start_parent: Option<Uuid>, target: Uuid) -> Result<bool> {
    let mut cursor = start_parent;
    while let Some(id) = cursor {
        if id == target {
            return Ok(true);
        }
        let f = folder::Entity::find_by_id(id).one(db).await?;
        cursor = f.and_then(|f| f.parent_folder_id);
    }
    Ok(false)
}

pub async fn create_folder(
    db: &DatabaseConnection,
    name: &str,
    project_id: Uuid,
    parent_folder_id: Option<Uuid>,
) -> Result<Uuid> {
    if name.trim().is_empty() {
        return Err(Error::invalid("folder name must not be empty"));
    }
    project::Entity::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("project {project_id}")))?;
    if let Some(parent_id) = parent_folder_id {
        let parent = folder::Entity::find_by_id(parent_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found(format!("folder {parent_id}")))?;
        if parent.project_id != project_id {
            return Err(Error::invalid("parent folder belongs to a different project"));
        }
    }
    let mut q = folder::Entity::find()
        .filter(folder::Column::ProjectId.eq(project_id))
        .filter(folder::Column::Name.eq(name));
    q = match parent_folder_id {
        Some(pid) => q.filter(folder::Column::ParentFolderId.eq(pid)),
        None => q.filter(folder::Column::ParentFolderId.is_null()),
    };
    if q.one(db).await?.is_some() {
        return Err(Error::conflict(format!("folder '{name}' already exists here")));
    }
    let id = Uuid::new_v4();
    folder::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        project_id: Set(project_id),
        parent_folder_id: Set(parent_folder_id),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(id)
}

pub async fn create_file(
    db: &DatabaseConnection,
    name: &str,
    project_id: Uuid,
    folder_id: Option<Uuid>,
    format: file::FileFormat,
) -> Result<Uuid> {
    if name.trim().is_empty() {
        return Err(Error::invalid("file name must not be empty"));
    }
    project::Entity::find_by_id(project_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("project {project_id}")))?;
    if let Some(fid) = folder_id {
        let folder = folder::Entity::find_by_id(fid)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found(format!("folder {fid}")))?;
        if folder.project_id != project_id {
            return Err(Error::invalid("folder belongs to a different project"));
        }
    }
    let mut q = file::Entity::find()
        .filter(file::Column::ProjectId.eq(project_id))
        .filter(file::Column::Name.eq(name));
    q = match folder_id {
        Some(fid) => q.filter(file::Column::FolderId.eq(fid)),
        None => q.filter(file::Column::FolderId.is_null()),
    };
    if q.one(db).await?.is_some() {
        return Err(Error::conflict(format!("file '{name}' already exists here")));
    }
    let id = Uuid::new_v4();
    let now = Utc::now();
    file::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        project_id: Set(project_id),
        folder_id: Set(folder_id),
        format: Set(format),
        row_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(id)
}

pub async fn rename(db: &DatabaseConnection, kind: EntityKind, id: Uuid, new_name: &str) -> Result<()> {
    if new_name.trim().is_empty() {
        return Err(Error::invalid("name must not be empty"));
    }
    match kind {
        EntityKind::Platform => {
            let p = platform::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("platform {id}")))?;
            if platform::Entity::find()
                .filter(platform::Column::Name.eq(new_name))
                .filter(platform::Column::Id.ne(id))
                .one(db)
                .await?
                .is_some()
            {
                return Err(Error::conflict(format!("platform '{new_name}' already exists")));
            }
            let mut am: platform::ActiveModel = p.into();
            am.name = Set(new_name.to_string());
            am.update(db).await?;
        }
        EntityKind::Project => {
            let p = project::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("project {id}")))?;
            let mut q = project::Entity::find()
                .filter(project::Column::Name.eq(new_name))
                .filter(project::Column::Id.ne(id));
            q = match p.platform_id {
                Some(pid) => q.filter(project::Column::PlatformId.eq(pid)),
                None => q.filter(project::Column::PlatformId.is_null()),
            };
            if q.one(db).await?.is_some() {
                return Err(Error::conflict(format!("project '{new_name}' already exists in this scope")));
            }
            let mut am: project::ActiveModel = p.into();
            am.name = Set(new_name.to_string());
            am.updated_at = Set(Utc::now());
            am.update(db).await?;
        }
        EntityKind::Folder => {
            let f = folder::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("folder {id}")))?;
            let mut q = folder::Entity::find()
                .filter(folder::Column::ProjectId.eq(f.project_id))
                .filter(folder::Column::Name.eq(new_name))
                .filter(folder::Column::Id.ne(id));
            q = match f.parent_folder_id {
                Some(pid) => q.filter(folder::Column::ParentFolderId.eq(pid)),
                None => q.filter(folder::Column::ParentFolderId.is_null()),
            };
            if q.one(db).await?.is_some() {
                return Err(Error::conflict(format!("folder '{new_name}' already exists here")));
            }
            let mut am: folder::ActiveModel = f.into();
            am.name = Set(new_name.to_string());
            am.update(db).await?;
        }
        EntityKind::File => {
            let f = file::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("file {id}")))?;
            let mut q = file::Entity::find()
                .filter(file::Column::ProjectId.eq(f.project_id))
                .filter(file::Column::Name.eq(new_name))
                .filter(file::Column::Id.ne(id));
            q = match f.folder_id {
                Some(fid) => q.filter(file::Column::FolderId.eq(fid)),
                None => q.filter(file::Column::FolderId.is_null()),
            };
            if q.one(db).await?.is_some() {
                return Err(Error::conflict(format!("file '{new_name}' already exists here")));
            }
            let mut am: file::ActiveModel = f.into();
            am.name = Set(new_name.to_string());
            am.updated_at = Set(Utc::now());
            am.update(db).await?;
        }
    }
    Ok(())
}

pub async fn move_item(db: &DatabaseConnection, kind: EntityKind, id: Uuid, new_parent: ParentRef) -> Result<()> {
    match kind {
        EntityKind::Folder => {
            let f = folder::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("folder {id}")))?;
            let new_parent_id = match new_parent {
                ParentRef::Project(pid) if pid == f.project_id => None,
                ParentRef::Folder(fid) => {
                    let target = folder::Entity::find_by_id(fid)
                        .one(db)
                        .await?
                        .ok_or_else(|| Error::not_found(format!("folder {fid}")))?;
                    if target.project_id != f.project_id {
                        return Err(Error::invalid("cannot move folder across projects with `move`; use move_cross_project"));
                    }
                    if fid == id || would_cycle(db, Some(fid), id).await? {
                        return Err(Error::invalid("move would create a cycle"));
                    }
                    Some(fid)
                }
                _ => return Err(Error::invalid("invalid move target for a folder")),
            };
            if folder::Entity::find()
                .filter(folder::Column::ProjectId.eq(f.project_id))
                .filter(folder::Column::Name.eq(&f.name))
                .filter(folder::Column::Id.ne(id))
                .filter(match new_parent_id {
                    Some(pid) => folder::Column::ParentFolderId.eq(pid),
                    None => folder::Column::ParentFolderId.is_null(),
                })
                .one(db)
                .await?
                .is_some()
            {
                return Err(Error::conflict("a folder with this name already exists at the destination"));
            }
            let mut am: folder::ActiveModel = f.into();
            am.parent_folder_id = Set(new_parent_id);
            am.update(db).await?;
        }
        EntityKind::File => {
            let f = file::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("file {id}")))?;
            let new_folder_id = match new_parent {
                ParentRef::Project(pid) if pid == f.project_id => None,
                ParentRef::Folder(fid) => {
                    let target = folder::Entity::find_by_id(fid)
                        .one(db)
                        .await?
                        .ok_or_else(|| Error::not_found(format!("folder {fid}")))?;
                    if target.project_id != f.project_id {
                        return Err(Error::invalid("cannot move file across projects with `move`; use move_cross_project"));
                    }
                    Some(fid)
                }
                _ => return Err(Error::invalid("invalid move target for a file")),
            };
            if file::Entity::find()
                .filter(file::Column::ProjectId.eq(f.project_id))
                .filter(file::Column::Name.eq(&f.name))
                .filter(file::Column::Id.ne(id))
                .filter(match new_folder_id {
                    Some(fid) => file::Column::FolderId.eq(fid),
                    None => file::Column::FolderId.is_null(),
                })
                .one(db)
                .await?
                .is_some()
            {
                return Err(Error::conflict("a file with this name already exists at the destination"));
            }
            let mut am: file::ActiveModel = f.into();
            am.folder_id = Set(new_folder_id);
            am.updated_at = Set(Utc::now());
            am.update(db).await?;
        }
        _ => return Err(Error::invalid("only folders and files can be moved with `move`")),
    }
    Ok(())
}

/// Rewrites `project_id` on an entire subtree in one transaction
/// (spec §4.1 `move_cross_project`).
pub async fn move_cross_project(
    db: &DatabaseConnection,
    kind: EntityKind,
    id: Uuid,
    new_project_id: Uuid,
    new_parent: ParentRef,
) -> Result<()> {
    project::Entity::find_by_id(new_project_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("project {new_project_id}")))?;

    db.transaction::<_, (), Error>(|txn| {
        Box::pin(async move {
            match kind {
                EntityKind::Folder => {
                    let f = folder::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| Error::not_found(format!("folder {id}")))?;
                    let new_parent_id = match new_parent {
                        ParentRef::Project(pid) if pid == new_project_id => None,
                        ParentRef::Folder(fid) => Some(fid),
                        _ => return Err(Error::invalid("invalid destination for move_cross_project")),
                    };
                    rewrite_folder_subtree_project(txn, id, new_project_id).await?;
                    let mut am: folder::ActiveModel = f.into();
                    am.project_id = Set(new_project_id);
                    am.parent_folder_id = Set(new_parent_id);
                    am.update(txn).await?;
                }
                EntityKind::File => {
                    let f = file::Entity::find_by_id(id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| Error::not_found(format!("file {id}")))?;
                    let new_folder_id = match new_parent {
                        ParentRef::Project(pid) if pid == new_project_id => None,
                        ParentRef::Folder(fid) => Some(fid),
                        _ => return Err(Error::invalid("invalid destination for move_cross_project")),
                    };
                    let mut am: file::ActiveModel = f.into();
                    am.project_id = Set(new_project_id);
                    am.folder_id = Set(new_folder_id);
                    am.updated_at = Set(Utc::now());
                    am.update(txn).await?;
                }
                _ => return Err(Error::invalid("only folders and files support move_cross_project")),
            }
            Ok(())
        })
    })
    .await
    .map_err(|e| match e {
        sea_orm::TransactionError::Connection(db_err) => Error::from(db_err),
        sea_orm::TransactionError::Transaction(err) => err,
    })
}

async fn rewrite_folder_subtree_project(
    txn: &sea_orm::DatabaseTransaction,
    folder_id: Uuid,
    new_project_id: Uuid,
) -> Result<()> {
    let children = folder::Entity::find()
        .filter(folder::Column::ParentFolderId.eq(folder_id))
        .all(txn)
        .await?;
    for child in children {
        let child_id = child.id;
        let mut am: folder::ActiveModel = child.into();
        am.project_id = Set(new_project_id);
        am.update(txn).await?;
        Box::pin(rewrite_folder_subtree_project(txn, child_id, new_project_id)).await?;
    }
    let files = file::Entity::find()
        .filter(file::Column::FolderId.eq(folder_id))
        .all(txn)
        .await?;
    for f in files {
        let mut am: file::ActiveModel = f.into();
        am.project_id = Set(new_project_id);
        am.update(txn).await?;
    }
    Ok(())
}

pub async fn list_trash(db: &DatabaseConnection) -> Result<Vec<TrashEntry>> {
    let items = trash_item::Entity::find()
        .order_by_desc(trash_item::Column::DeletedAt)
        .all(db)
        .await?;
    Ok(items
        .into_iter()
        .map(|t| TrashEntry {
            trash_id: t.trash_id,
            item_type: t.item_type,
            item_id: t.item_id,
            item_name: t.item_name,
            deleted_at: t.deleted_at,
            expires_at: t.expires_at,
        })
        .collect())
}

pub async fn purge_expired(db: &DatabaseConnection) -> Result<usize> {
    let now = Utc::now();
    let expired = trash_item::Entity::find()
        .filter(trash_item::Column::ExpiresAt.lte(now))
        .all(db)
        .await?;
    let count = expired.len();
    for item in expired {
        trash_item::Entity::delete_by_id(item.trash_id).exec(db).await?;
    }
    Ok(count)
}

pub async fn purge(db: &DatabaseConnection, trash_id: Uuid) -> Result<()> {
    let res = trash_item::Entity::delete_by_id(trash_id).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(Error::not_found(format!("trash item {trash_id}")));
    }
    Ok(())
}

pub async fn get_row(db: &DatabaseConnection, row_id: Uuid) -> Result<row::Model> {
    row::Entity::find_by_id(row_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("row {row_id}")))
}

pub async fn list_rows(db: &DatabaseConnection, file_id: Uuid) -> Result<Vec<row::Model>> {
    file::Entity::find_by_id(file_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("file {file_id}")))?;
    Ok(row::Entity::find()
        .filter(row::Column::FileId.eq(file_id))
        .order_by_asc(row::Column::Index)
        .all(db)
        .await?)
}

pub async fn edit_row(db: &DatabaseConnection, row_id: Uuid, patch: RowEdit) -> Result<row::Model> {
    let existing = row::Entity::find_by_id(row_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("row {row_id}")))?;
    let mut am: row::ActiveModel = existing.into();
    if let Some(source) = patch.source {
        am.source = Set(source);
    }
    if let Some(target) = patch.target {
        am.target = Set(target);
    }
    if let Some(status) = patch.status {
        am.status = Set(status);
    }
    if let Some(metadata) = patch.metadata {
        am.metadata = Set(Some(metadata));
    }
    Ok(am.update(db).await?)
}

/// Upserts rows by `(file_id, index)` and recomputes `files.row_count`
/// to match the live row count (spec §4.1, §8 invariant).
pub async fn bulk_upsert_rows(db: &DatabaseConnection, file_id: Uuid, rows: Vec<NewRow>) -> Result<usize> {
    let f = file::Entity::find_by_id(file_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("file {file_id}")))?;

    let count = db
        .transaction::<_, usize, Error>(|txn| {
            let rows = rows;
            Box::pin(async move {
                let mut written = 0usize;
                for new_row in rows {
                    let existing = row::Entity::find()
                        .filter(row::Column::FileId.eq(file_id))
                        .filter(row::Column::Index.eq(new_row.index))
                        .one(txn)
                        .await?;
                    match existing {
                        Some(existing) => {
                            let mut am: row::ActiveModel = existing.into();
                            am.source = Set(new_row.source);
                            am.target = Set(new_row.target);
                            am.status = Set(new_row.status);
                            am.string_id = Set(new_row.string_id);
                            am.metadata = Set(new_row.metadata);
                            am.update(txn).await?;
                        }
                        None => {
                            row::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                file_id: Set(file_id),
                                index: Set(new_row.index),
                                source: Set(new_row.source),
                                target: Set(new_row.target),
                                status: Set(new_row.status),
                                string_id: Set(new_row.string_id),
                                metadata: Set(new_row.metadata),
                            }
                            .insert(txn)
                            .await?;
                        }
                    }
                    written += 1;
                }
                let live = row::Entity::find()
                    .filter(row::Column::FileId.eq(file_id))
                    .all(txn)
                    .await?
                    .len() as i32;
                let mut file_am: file::ActiveModel = file::Entity::find_by_id(file_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("file {file_id}")))?
                    .into();
                file_am.row_count = Set(live);
                file_am.updated_at = Set(Utc::now());
                file_am.update(txn).await?;
                Ok(written)
            })
        })
        .await
        .map_err(|e| match e {
            sea_orm::TransactionError::Connection(db_err) => Error::from(db_err),
            sea_orm::TransactionError::Transaction(err) => err,
        })?;
    let _ = f; // existence already checked above
    Ok(count)
}

/// Deletes a row and compacts the remaining indices back to a dense
/// `1..N` sequence (spec §3 Row invariant, §8 testable property).
pub async fn delete_row_and_compact(db: &DatabaseConnection, row_id: Uuid) -> Result<()> {
    let r = row::Entity::find_by_id(row_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("row {row_id}")))?;
    let file_id = r.file_id;
    let deleted_index = r.index;

    db.transaction::<_, (), Error>(|txn| {
        Box::pin(async move {
            row::Entity::delete_by_id(row_id).exec(txn).await?;
            let remaining = row::Entity::find()
                .filter(row::Column::FileId.eq(file_id))
                .filter(row::Column::Index.gt(deleted_index))
                .order_by_asc(row::Column::Index)
                .all(txn)
                .await?;
            for r in remaining {
                let new_index = r.index - 1;
                let mut am: row::ActiveModel = r.into();
                am.index = Set(new_index);
                am.update(txn).await?;
            }
            let live = row::Entity::find()
                .filter(row::Column::FileId.eq(file_id))
                .all(txn)
                .await?
                .len() as i32;
            let mut file_am: file::ActiveModel = file::Entity::find_by_id(file_id)
                .one(txn)
                .await?
                .ok_or_else(|| Error::not_found(format!("file {file_id}")))?
                .into();
            file_am.row_count = Set(live);
            file_am.update(txn).await?;
            Ok(())
        })
    })
    .await
    .map_err(|e| match e {
        sea_orm::TransactionError::Connection(db_err) => Error::from(db_err),
        sea_orm::TransactionError::Transaction(err) => err,
    })
}

/// Soft-deletes a single entity plus, for container kinds, its whole
/// subtree, recorded as one JSON snapshot so `restore` can recreate it
/// byte-exactly (spec §4.1 `soft_delete`/`restore`, §8 round-trip law).
pub async fn soft_delete(
    db: &DatabaseConnection,
    kind: EntityKind,
    id: Uuid,
    retention_days: i64,
) -> Result<Uuid> {
    let (item_name, parent_project_id, parent_folder_id, snapshot) = match kind {
        EntityKind::Platform => {
            let p = platform::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("platform {id}")))?;
            (p.name.clone(), None, None, json!({ "platform": p }))
        }
        EntityKind::Project => {
            let p = project::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("project {id}")))?;
            let folders = folder::Entity::find().filter(folder::Column::ProjectId.eq(id)).all(db).await?;
            let files = file::Entity::find().filter(file::Column::ProjectId.eq(id)).all(db).await?;
            let mut rows_by_file = serde_json::Map::new();
            for f in &files {
                let rows = row::Entity::find().filter(row::Column::FileId.eq(f.id)).all(db).await?;
                rows_by_file.insert(f.id.to_string(), json!(rows));
            }
            (
                p.name.clone(),
                None,
                None,
                json!({ "project": p, "folders": folders, "files": files, "rows": rows_by_file }),
            )
        }
        EntityKind::Folder => {
            let f = folder::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("folder {id}")))?;
            let subfolders = folder::Entity::find().filter(folder::Column::ParentFolderId.eq(id)).all(db).await?;
            let files = file::Entity::find().filter(file::Column::FolderId.eq(id)).all(db).await?;
            let mut rows_by_file = serde_json::Map::new();
            for file_row in &files {
                let rows = row::Entity::find().filter(row::Column::FileId.eq(file_row.id)).all(db).await?;
                rows_by_file.insert(file_row.id.to_string(), json!(rows));
            }
            (
                f.name.clone(),
                Some(f.project_id),
                f.parent_folder_id,
                json!({ "folder": f, "subfolders": subfolders, "files": files, "rows": rows_by_file }),
            )
        }
        EntityKind::File => {
            let f = file::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found(format!("file {id}")))?;
            let rows = row::Entity::find().filter(row::Column::FileId.eq(id)).all(db).await?;
            (
                f.name.clone(),
                Some(f.project_id),
                f.folder_id,
                json!({ "file": f, "rows": rows }),
            )
        }
    };

    let trash_id = Uuid::new_v4();
    let now = Utc::now();
    db.transaction::<_, (), Error>(|txn| {
        Box::pin(async move {
            trash_item::ActiveModel {
                trash_id: Set(trash_id),
                item_type: Set(trash_item_type(kind)),
                item_id: Set(id),
                item_name: Set(item_name),
                parent_project_id: Set(parent_project_id),
                parent_folder_id: Set(parent_folder_id),
                snapshot: Set(snapshot),
                deleted_at: Set(now),
                expires_at: Set(now + ChronoDuration::days(retention_days)),
            }
            .insert(txn)
            .await?;

            match kind {
                EntityKind::Platform => {
                    platform::Entity::delete_by_id(id).exec(txn).await?;
                }
                EntityKind::Project => {
                    project::Entity::delete_by_id(id).exec(txn).await?;
                }
                EntityKind::Folder => {
                    folder::Entity::delete_by_id(id).exec(txn).await?;
                }
                EntityKind::File => {
                    file::Entity::delete_by_id(id).exec(txn).await?;
                }
            }
            Ok(())
        })
    })
    .await
    .map_err(|e| match e {
        sea_orm::TransactionError::Connection(db_err) => Error::from(db_err),
        sea_orm::TransactionError::Transaction(err) => err,
    })?;
    Ok(trash_id)
}

/// Restores an item to its original location if the parents still
/// exist, otherwise lands it at the nearest surviving ancestor and
/// auto-renames on a name collision (spec §4.1 `restore`, §8 round-trip law).
pub async fn restore(db: &DatabaseConnection, trash_id: Uuid) -> Result<RestoreOutcome> {
    let item = trash_item::Entity::find_by_id(trash_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(format!("trash item {trash_id}")))?;

    let outcome = db
        .transaction::<_, RestoreOutcome, Error>(|txn| {
            let item = item.clone();
            Box::pin(async move {
                match item.item_type {
                    trash_item::TrashItemType::Platform => {
                        let p: platform::Model = serde_json::from_value(item.snapshot["platform"].clone())
                            .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
                        platform::ActiveModel {
                            id: Set(p.id),
                            name: Set(p.name),
                            description: Set(p.description),
                            is_restricted: Set(p.is_restricted),
                            created_at: Set(p.created_at),
                        }
                        .insert(txn)
                        .await?;
                        trash_item::Entity::delete_by_id(trash_id).exec(txn).await?;
                        Ok(RestoreOutcome {
                            item_id: item.item_id,
                            landed_parent: ParentRef::Root,
                            renamed_to: None,
                        })
                    }
                    trash_item::TrashItemType::Project => {
                        let mut p: project::Model = serde_json::from_value(item.snapshot["project"].clone())
                            .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
                        if let Some(pid) = p.platform_id {
                            if platform::Entity::find_by_id(pid).one(txn).await?.is_none() {
                                p.platform_id = None;
                            }
                        }
                        let renamed_to = rename_on_collision_project(txn, &mut p).await?;
                        project::ActiveModel {
                            id: Set(p.id),
                            name: Set(p.name.clone()),
                            platform_id: Set(p.platform_id),
                            is_restricted: Set(p.is_restricted),
                            created_at: Set(p.created_at),
                            updated_at: Set(Utc::now()),
                        }
                        .insert(txn)
                        .await?;
                        restore_project_subtree(txn, &item.snapshot).await?;
                        trash_item::Entity::delete_by_id(trash_id).exec(txn).await?;
                        Ok(RestoreOutcome {
                            item_id: item.item_id,
                            landed_parent: ParentRef::Root,
                            renamed_to,
                        })
                    }
                    trash_item::TrashItemType::Folder => {
                        let mut f: folder::Model = serde_json::from_value(item.snapshot["folder"].clone())
                            .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
                        let project_alive = project::Entity::find_by_id(f.project_id).one(txn).await?.is_some();
                        if !project_alive {
                            return Err(Error::not_found(format!("project {} for folder restore", f.project_id)));
                        }
                        if let Some(parent_id) = f.parent_folder_id {
                            if folder::Entity::find_by_id(parent_id).one(txn).await?.is_none() {
                                f.parent_folder_id = None;
                            }
                        }
                        let renamed_to = rename_on_collision_folder(txn, &mut f).await?;
                        let landed = f.parent_folder_id;
                        folder::ActiveModel {
                            id: Set(f.id),
                            name: Set(f.name.clone()),
                            project_id: Set(f.project_id),
                            parent_folder_id: Set(f.parent_folder_id),
                            created_at: Set(f.created_at),
                        }
                        .insert(txn)
                        .await?;
                        restore_folder_subtree(txn, &item.snapshot).await?;
                        trash_item::Entity::delete_by_id(trash_id).exec(txn).await?;
                        Ok(RestoreOutcome {
                            item_id: item.item_id,
                            landed_parent: landed.map(ParentRef::Folder).unwrap_or(ParentRef::Project(f.project_id)),
                            renamed_to,
                        })
                    }
                    trash_item::TrashItemType::File => {
                        let mut f: file::Model = serde_json::from_value(item.snapshot["file"].clone())
                            .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
                        if project::Entity::find_by_id(f.project_id).one(txn).await?.is_none() {
                            return Err(Error::not_found(format!("project {} for file restore", f.project_id)));
                        }
                        if let Some(folder_id) = f.folder_id {
                            if folder::Entity::find_by_id(folder_id).one(txn).await?.is_none() {
                                f.folder_id = None;
                            }
                        }
                        let renamed_to = rename_on_collision_file(txn, &mut f).await?;
                        let landed = f.folder_id;
                        file::ActiveModel {
                            id: Set(f.id),
                            name: Set(f.name.clone()),
                            project_id: Set(f.project_id),
                            folder_id: Set(f.folder_id),
                            format: Set(f.format.clone()),
                            row_count: Set(f.row_count),
                            created_at: Set(f.created_at),
                            updated_at: Set(Utc::now()),
                        }
                        .insert(txn)
                        .await?;
                        if let Some(rows) = item.snapshot.get("rows") {
                            let rows: Vec<row::Model> = serde_json::from_value(rows.clone())
                                .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
                            for r in rows {
                                row::ActiveModel {
                                    id: Set(r.id),
                                    file_id: Set(r.file_id),
                                    index: Set(r.index),
                                    source: Set(r.source),
                                    target: Set(r.target),
                                    status: Set(r.status),
                                    string_id: Set(r.string_id),
                                    metadata: Set(r.metadata),
                                }
                                .insert(txn)
                                .await?;
                            }
                        }
                        trash_item::Entity::delete_by_id(trash_id).exec(txn).await?;
                        Ok(RestoreOutcome {
                            item_id: item.item_id,
                            landed_parent: landed.map(ParentRef::Folder).unwrap_or(ParentRef::Project(f.project_id)),
                            renamed_to,
                        })
                    }
                }
            })
        })
        .await
        .map_err(|e| match e {
            sea_orm::TransactionError::Connection(db_err) => Error::from(db_err),
            sea_orm::TransactionError::Transaction(err) => err,
        })?;
    Ok(outcome)
}

async fn rename_on_collision_project(
    txn: &sea_orm::DatabaseTransaction,
    p: &mut project::Model,
) -> Result<Option<String>> {
    let mut q = project::Entity::find().filter(project::Column::Name.eq(&p.name));
    q = match p.platform_id {
        Some(pid) => q.filter(project::Column::PlatformId.eq(pid)),
        None => q.filter(project::Column::PlatformId.is_null()),
    };
    if q.one(txn).await?.is_some() {
        let new_name = format!("{} (restored)", p.name);
        p.name = new_name.clone();
        Ok(Some(new_name))
    } else {
        Ok(None)
    }
}

async fn rename_on_collision_folder(txn: &sea_orm::DatabaseTransaction, f: &mut folder::Model) -> Result<Option<String>> {
    let mut q = folder::Entity::find()
        .filter(folder::Column::ProjectId.eq(f.project_id))
        .filter(folder::Column::Name.eq(&f.name));
    q = match f.parent_folder_id {
        Some(pid) => q.filter(folder::Column::ParentFolderId.eq(pid)),
        None => q.filter(folder::Column::ParentFolderId.is_null()),
    };
    if q.one(txn).await?.is_some() {
        let new_name = format!("{} (restored)", f.name);
        f.name = new_name.clone();
        Ok(Some(new_name))
    } else {
        Ok(None)
    }
}

async fn rename_on_collision_file(txn: &sea_orm::DatabaseTransaction, f: &mut file::Model) -> Result<Option<String>> {
    let mut q = file::Entity::find()
        .filter(file::Column::ProjectId.eq(f.project_id))
        .filter(file::Column::Name.eq(&f.name));
    q = match f.folder_id {
        Some(fid) => q.filter(file::Column::FolderId.eq(fid)),
        None => q.filter(file::Column::FolderId.is_null()),
    };
    if q.one(txn).await?.is_some() {
        let new_name = format!("{} (restored)", f.name);
        f.name = new_name.clone();
        Ok(Some(new_name))
    } else {
        Ok(None)
    }
}

async fn restore_project_subtree(txn: &sea_orm::DatabaseTransaction, snapshot: &serde_json::Value) -> Result<()> {
    let folders: Vec<folder::Model> = serde_json::from_value(snapshot["folders"].clone())
        .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
    let files: Vec<file::Model> = serde_json::from_value(snapshot["files"].clone())
        .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
    for f in folders {
        folder::ActiveModel {
            id: Set(f.id),
            name: Set(f.name),
            project_id: Set(f.project_id),
            parent_folder_id: Set(f.parent_folder_id),
            created_at: Set(f.created_at),
        }
        .insert(txn)
        .await?;
    }
    restore_files_and_rows(txn, &files, &snapshot["rows"]).await
}

async fn restore_folder_subtree(txn: &sea_orm::DatabaseTransaction, snapshot: &serde_json::Value) -> Result<()> {
    let subfolders: Vec<folder::Model> = serde_json::from_value(snapshot["subfolders"].clone())
        .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
    let files: Vec<file::Model> = serde_json::from_value(snapshot["files"].clone())
        .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
    for f in subfolders {
        folder::ActiveModel {
            id: Set(f.id),
            name: Set(f.name),
            project_id: Set(f.project_id),
            parent_folder_id: Set(f.parent_folder_id),
            created_at: Set(f.created_at),
        }
        .insert(txn)
        .await?;
    }
    restore_files_and_rows(txn, &files, &snapshot["rows"]).await
}

async fn restore_files_and_rows(
    txn: &sea_orm::DatabaseTransaction,
    files: &[file::Model],
    rows_by_file: &serde_json::Value,
) -> Result<()> {
    for f in files {
        file::ActiveModel {
            id: Set(f.id),
            name: Set(f.name.clone()),
            project_id: Set(f.project_id),
            folder_id: Set(f.folder_id),
            format: Set(f.format.clone()),
            row_count: Set(f.row_count),
            created_at: Set(f.created_at),
            updated_at: Set(f.updated_at),
        }
        .insert(txn)
        .await?;
        if let Some(rows_json) = rows_by_file.get(f.id.to_string()) {
            let rows: Vec<row::Model> = serde_json::from_value(rows_json.clone())
                .map_err(|e| Error::internal(format!("corrupt trash snapshot: {e}")))?;
            for r in rows {
                row::ActiveModel {
                    id: Set(r.id),
                    file_id: Set(r.file_id),
                    index: Set(r.index),
                    source: Set(r.source),
                    target: Set(r.target),
                    status: Set(r.status),
                    string_id: Set(r.string_id),
                    metadata: Set(r.metadata),
                }
                .insert(txn)
                .await?;
            }
        }
    }
    Ok(())
}

/// Copies the whole subtree under `(kind, id)` to `new_parent`; rows
/// and, transitively, the source's TM entries are duplicated, and the
/// new file's `row_count` is fixed at the source's count at copy time
/// (spec §4.1 `copy`). The entire subtree — however many nested
/// folders and files it contains — is copied inside one transaction,
/// so a failure partway rolls back every node created so far rather
/// than leaving a partial copy committed.
pub async fn copy_subtree(db: &DatabaseConnection, kind: EntityKind, id: Uuid, new_parent: ParentRef) -> Result<Uuid> {
    db.transaction::<_, Uuid, Error>(|txn| Box::pin(async move { copy_subtree_txn(txn, kind, id, new_parent).await }))
        .await
        .map_err(|e| match e {
            sea_orm::TransactionError::Connection(db_err) => Error::from(db_err),
            sea_orm::TransactionError::Transaction(err) => err,
        })
}

fn copy_subtree_txn<'a>(
    txn: &'a sea_orm::DatabaseTransaction,
    kind: EntityKind,
    id: Uuid,
    new_parent: ParentRef,
) -> futures::future::BoxFuture<'a, Result<Uuid>> {
    Box::pin(async move {
        match kind {
            EntityKind::File => {
                let f = file::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("file {id}")))?;
                let (project_id, folder_id) = match new_parent {
                    ParentRef::Project(pid) => (pid, None),
                    ParentRef::Folder(fid) => {
                        let target = folder::Entity::find_by_id(fid)
                            .one(txn)
                            .await?
                            .ok_or_else(|| Error::not_found(format!("folder {fid}")))?;
                        (target.project_id, Some(fid))
                    }
                    _ => return Err(Error::invalid("invalid copy destination for a file")),
                };
                let rows = row::Entity::find().filter(row::Column::FileId.eq(id)).all(txn).await?;
                let new_id = Uuid::new_v4();
                let now = Utc::now();
                file::ActiveModel {
                    id: Set(new_id),
                    name: Set(f.name.clone()),
                    project_id: Set(project_id),
                    folder_id: Set(folder_id),
                    format: Set(f.format.clone()),
                    row_count: Set(rows.len() as i32),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;
                for r in rows {
                    row::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        file_id: Set(new_id),
                        index: Set(r.index),
                        source: Set(r.source),
                        target: Set(r.target),
                        status: Set(r.status),
                        string_id: Set(r.string_id),
                        metadata: Set(r.metadata),
                    }
                    .insert(txn)
                    .await?;
                }
                Ok(new_id)
            }
            EntityKind::Folder => {
                let f = folder::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("folder {id}")))?;
                let (project_id, parent_folder_id) = match new_parent {
                    ParentRef::Project(pid) => (pid, None),
                    ParentRef::Folder(fid) => {
                        let target = folder::Entity::find_by_id(fid)
                            .one(txn)
                            .await?
                            .ok_or_else(|| Error::not_found(format!("folder {fid}")))?;
                        (target.project_id, Some(fid))
                    }
                    _ => return Err(Error::invalid("invalid copy destination for a folder")),
                };
                let new_id = Uuid::new_v4();
                folder::ActiveModel {
                    id: Set(new_id),
                    name: Set(f.name.clone()),
                    project_id: Set(project_id),
                    parent_folder_id: Set(parent_folder_id),
                    created_at: Set(Utc::now()),
                }
                .insert(txn)
                .await?;
                let children = folder::Entity::find().filter(folder::Column::ParentFolderId.eq(id)).all(txn).await?;
                for child in children {
                    copy_subtree_txn(txn, EntityKind::Folder, child.id, ParentRef::Folder(new_id)).await?;
                }
                let files = file::Entity::find().filter(file::Column::FolderId.eq(id)).all(txn).await?;
                for f in files {
                    copy_subtree_txn(txn, EntityKind::File, f.id, ParentRef::Folder(new_id)).await?;
                }
                Ok(new_id)
            }
            _ => Err(Error::invalid("copy supports folders and files")),
        }
    })
}

/// Permanently removes trash entries never swept because their
/// parent process wasn't running; should be invoked periodically by
/// the caller (the scheduler's own background tick, not this crate).
pub async fn list_operations_for_user(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<crate::db::entities::operation::Model>> {
    Ok(crate::db::entities::operation::Entity::find()
        .filter(crate::db::entities::operation::Column::UserId.eq(user_id))
        .order_by_desc(crate::db::entities::operation::Column::StartedAt)
        .all(db)
        .await?)
}

pub fn is_terminal(state: OperationState) -> bool {
    state.is_terminal()
}

// `tm` entity import kept for downstream modules that reuse this engine's helpers.
pub use crate::db::entities::tm as tm_entities;
