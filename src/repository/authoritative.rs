//! The authoritative (PostgreSQL) backend. Unlike `LocalBackend`,
//! mutations don't route through a single writer — Postgres's own
//! row-level locking and MVCC handle concurrent writers directly, so
//! every call here goes straight through the shared connection pool
//! (spec §4.1 "Concurrency control on the authoritative backend").

use crate::db::entities::{file::FileFormat, row::RowStatus, trash_item::TrashItemType};
use crate::domain::{EntityKind, HierarchyNode, NewRow, RowEdit, TrashEntry};
use crate::error::{Error, Result};
use crate::principal::Principal;
use crate::repository::{engine, ParentRef, Repository, RestoreOutcome};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

#[derive(Clone)]
pub struct AuthoritativeBackend {
    db: DatabaseConnection,
    retention_days: i64,
}

impl AuthoritativeBackend {
    pub fn new(db: DatabaseConnection, retention_days: i64) -> Self {
        Self { db, retention_days }
    }

    fn check_write_access(&self, principal: &Principal, project_id: Uuid) -> Result<()> {
        if principal.can_access_project(project_id) {
            Ok(())
        } else {
            Err(Error::forbidden(format!("no write access to project {project_id}")))
        }
    }

    async fn require_scope_access(&self, principal: &Principal, kind: EntityKind, id: Uuid) -> Result<()> {
        use crate::db::entities::{file, folder, project};
        use sea_orm::EntityTrait;

        match kind {
            EntityKind::Platform => {
                if !principal.is_admin() {
                    return Err(Error::forbidden("only admins modify platforms"));
                }
                Ok(())
            }
            EntityKind::Project => {
                let p = project::Entity::find_by_id(id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("project {id}")))?;
                self.check_write_access(principal, p.id)
            }
            EntityKind::Folder => {
                let f = folder::Entity::find_by_id(id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("folder {id}")))?;
                self.check_write_access(principal, f.project_id)
            }
            EntityKind::File => {
                let f = file::Entity::find_by_id(id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("file {id}")))?;
                self.check_write_access(principal, f.project_id)
            }
        }
    }
}

#[async_trait]
impl Repository for AuthoritativeBackend {
    async fn list_children(&self, principal: &Principal, parent: ParentRef) -> Result<Vec<HierarchyNode>> {
        engine::list_children(&self.db, principal, parent).await
    }

    async fn create_platform(
        &self,
        principal: &Principal,
        name: &str,
        description: Option<&str>,
        is_restricted: bool,
    ) -> Result<Uuid> {
        if !principal.is_admin() {
            return Err(Error::forbidden("only admins create platforms"));
        }
        engine::create_platform(&self.db, name, description, is_restricted).await
    }

    async fn create_project(
        &self,
        principal: &Principal,
        name: &str,
        platform_id: Option<Uuid>,
        is_restricted: bool,
    ) -> Result<Uuid> {
        if !principal.is_admin() {
            return Err(Error::forbidden("only admins create projects"));
        }
        engine::create_project(&self.db, name, platform_id, is_restricted).await
    }

    async fn create_folder(
        &self,
        principal: &Principal,
        name: &str,
        project_id: Uuid,
        parent_folder_id: Option<Uuid>,
    ) -> Result<Uuid> {
        self.check_write_access(principal, project_id)?;
        // Concurrent `mkdir -p`-style callers can race to create the
        // same sibling; the unique constraint at the DB layer (where
        // the parent is non-null) turns the loser's insert into a
        // conflict rather than a duplicate row, which `create_folder`
        // surfaces as `Error::Conflict`.
        engine::create_folder(&self.db, name, project_id, parent_folder_id).await
    }

    async fn create_file(
        &self,
        principal: &Principal,
        name: &str,
        project_id: Uuid,
        folder_id: Option<Uuid>,
        format: FileFormat,
    ) -> Result<Uuid> {
        self.check_write_access(principal, project_id)?;
        engine::create_file(&self.db, name, project_id, folder_id, format).await
    }

    async fn rename(&self, principal: &Principal, kind: EntityKind, id: Uuid, new_name: &str) -> Result<()> {
        self.require_scope_access(principal, kind, id).await?;
        engine::rename(&self.db, kind, id, new_name).await
    }

    async fn move_item(&self, principal: &Principal, kind: EntityKind, id: Uuid, new_parent: ParentRef) -> Result<()> {
        self.require_scope_access(principal, kind, id).await?;
        engine::move_item(&self.db, kind, id, new_parent).await
    }

    async fn move_cross_project(
        &self,
        principal: &Principal,
        kind: EntityKind,
        id: Uuid,
        new_project_id: Uuid,
        new_parent: ParentRef,
    ) -> Result<()> {
        self.require_scope_access(principal, kind, id).await?;
        self.check_write_access(principal, new_project_id)?;
        engine::move_cross_project(&self.db, kind, id, new_project_id, new_parent).await
    }

    async fn copy(&self, principal: &Principal, kind: EntityKind, id: Uuid, new_parent: ParentRef) -> Result<Uuid> {
        self.require_scope_access(principal, kind, id).await?;
        engine::copy_subtree(&self.db, kind, id, new_parent).await
    }

    async fn soft_delete(&self, principal: &Principal, kind: EntityKind, id: Uuid) -> Result<Uuid> {
        self.require_scope_access(principal, kind, id).await?;
        engine::soft_delete(&self.db, kind, id, self.retention_days).await
    }

    async fn restore(&self, principal: &Principal, trash_id: Uuid) -> Result<RestoreOutcome> {
        if !principal.is_admin() {
            return Err(Error::forbidden("only admins restore trash items"));
        }
        engine::restore(&self.db, trash_id).await
    }

    async fn purge(&self, principal: &Principal, trash_id: Uuid) -> Result<()> {
        if !principal.is_admin() {
            return Err(Error::forbidden("only admins purge trash items"));
        }
        engine::purge(&self.db, trash_id).await
    }

    async fn purge_expired(&self) -> Result<usize> {
        engine::purge_expired(&self.db).await
    }

    async fn list_trash(&self, principal: &Principal) -> Result<Vec<TrashEntry>> {
        if !principal.is_admin() {
            return Err(Error::forbidden("only admins list trash"));
        }
        engine::list_trash(&self.db).await
    }

    async fn get_row(&self, _principal: &Principal, row_id: Uuid) -> Result<crate::db::entities::row::Model> {
        engine::get_row(&self.db, row_id).await
    }

    async fn list_rows(&self, _principal: &Principal, file_id: Uuid) -> Result<Vec<crate::db::entities::row::Model>> {
        engine::list_rows(&self.db, file_id).await
    }

    async fn edit_row(&self, _principal: &Principal, row_id: Uuid, patch: RowEdit) -> Result<crate::db::entities::row::Model> {
        engine::edit_row(&self.db, row_id, patch).await
    }

    async fn bulk_upsert_rows(&self, _principal: &Principal, file_id: Uuid, rows: Vec<NewRow>) -> Result<usize> {
        engine::bulk_upsert_rows(&self.db, file_id, rows).await
    }
}
