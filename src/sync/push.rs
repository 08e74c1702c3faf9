//! Pushing local edits back to the authoritative store (spec §4.4
//! "Promotion" / `upload_to_central`). Until promoted, local edits
//! only exist in the sandbox; conflict policy is "authoritative wins
//! structure, local wins row edits" — promotion is the only path row
//! edits take to become visible to anyone else.

use crate::domain::NewRow;
use crate::error::{Error, Result};
use crate::principal::Principal;
use crate::repository::{ParentRef, Repository};
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct UploadSummary {
    pub central_file_id: Uuid,
    pub rows_written: usize,
}

/// Copies a local file's rows into the authoritative store under
/// `destination_project_id`, creating the file there if one doesn't
/// already exist by name at that location. Returns the authoritative
/// `file_id` so the caller can repoint its subscription at it.
pub async fn upload_to_central(
    local_db: &DatabaseConnection,
    local: &Arc<dyn Repository>,
    central: &Arc<dyn Repository>,
    principal: &Principal,
    local_file_id: Uuid,
    destination_project_id: Uuid,
    destination_folder_id: Option<Uuid>,
) -> Result<UploadSummary> {
    let local_file = crate::db::entities::file::Entity::find_by_id(local_file_id)
        .one(local_db)
        .await?
        .ok_or_else(|| Error::not_found(format!("local file {local_file_id}")))?;

    let central_file_id = find_or_create_destination_file(central, principal, &local_file, destination_project_id, destination_folder_id).await?;

    let rows = local.list_rows(principal, local_file_id).await?;
    let new_rows: Vec<NewRow> = rows
        .into_iter()
        .map(|r| NewRow {
            index: r.index,
            source: r.source,
            target: r.target,
            status: r.status,
            string_id: r.string_id,
            metadata: r.metadata,
        })
        .collect();
    let rows_written = central.bulk_upsert_rows(principal, central_file_id, new_rows).await?;

    info!(local_file_id = %local_file_id, central_file_id = %central_file_id, rows_written, "promoted local file to authoritative store");
    Ok(UploadSummary { central_file_id, rows_written })
}

async fn find_or_create_destination_file(
    central: &Arc<dyn Repository>,
    principal: &Principal,
    local_file: &crate::db::entities::file::Model,
    destination_project_id: Uuid,
    destination_folder_id: Option<Uuid>,
) -> Result<Uuid> {
    let destination_parent = match destination_folder_id {
        Some(id) => ParentRef::Folder(id),
        None => ParentRef::Project(destination_project_id),
    };
    let siblings = central.list_children(principal, destination_parent).await?;

    if let Some(existing) = siblings
        .iter()
        .find(|n| n.kind == crate::domain::EntityKind::File && n.name == local_file.name)
    {
        return Ok(existing.id);
    }

    central
        .create_file(principal, &local_file.name, destination_project_id, destination_folder_id, local_file.format.clone())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::db::entities::{file::FileFormat, row::RowStatus};
    use crate::repository::LocalBackend;

    async fn new_store() -> (Arc<dyn Repository>, DatabaseConnection, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_sqlite(&dir.path().join("store.db")).await.unwrap();
        db.migrate().await.unwrap();
        let conn = db.conn().clone();
        (Arc::new(LocalBackend::new(conn.clone(), 30)), conn, dir)
    }

    /// Spec §8 scenario 5: "Offline promote". A file edited locally is
    /// pushed to the authoritative store, creating the destination file
    /// there and copying its rows.
    #[tokio::test]
    async fn promotes_local_file_creating_destination_and_copying_rows() {
        let (local, local_db, _local_dir) = new_store().await;
        let (central, _central_db, _central_dir) = new_store().await;
        let admin = Principal::admin(Uuid::new_v4());

        let local_project_id = local.create_project(&admin, "Game", None, false).await.unwrap();
        let local_file_id = local.create_file(&admin, "quests.txt", local_project_id, None, FileFormat::Txt).await.unwrap();
        local
            .bulk_upsert_rows(
                &admin,
                local_file_id,
                vec![NewRow { index: 1, source: "기습".into(), target: "Ambush".into(), status: RowStatus::Translated, string_id: None, metadata: None }],
            )
            .await
            .unwrap();

        let central_project_id = central.create_project(&admin, "Game", None, false).await.unwrap();

        let summary = upload_to_central(&local_db, &local, &central, &admin, local_file_id, central_project_id, None).await.unwrap();
        assert_eq!(summary.rows_written, 1);

        let central_rows = central.list_rows(&admin, summary.central_file_id).await.unwrap();
        assert_eq!(central_rows.len(), 1);
        assert_eq!(central_rows[0].target, "Ambush");

        // Pushing again reuses the same destination file rather than duplicating it.
        let second = upload_to_central(&local_db, &local, &central, &admin, local_file_id, central_project_id, None).await.unwrap();
        assert_eq!(second.central_file_id, summary.central_file_id);
    }
}
