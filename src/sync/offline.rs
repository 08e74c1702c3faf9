//! Offline Storage sandbox semantics (spec §4.4 "Offline Storage").
//!
//! Offline Storage is the local `LocalBackend` itself — not a
//! disguised platform row in the authoritative schema (see
//! SPEC_FULL.md's Open Question resolution). Everything pulled before
//! promotion lives here, scoped to the device it was pulled on.

use crate::error::Result;
use crate::principal::Principal;
use crate::repository::Repository;
use std::sync::Arc;
use tracing::warn;

/// One store's half of a cross-store trash-empty (spec §8 scenario 6:
/// "if only the authoritative empty fails, the local item is still
/// gone and the operation reports partial failure identifying which
/// store failed").
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreEmptyResult {
    pub purged: usize,
    pub failed: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EmptyTrashReport {
    pub local: StoreEmptyResult,
    pub central: StoreEmptyResult,
}

impl EmptyTrashReport {
    pub fn fully_succeeded(&self) -> bool {
        self.local.failed.is_none() && self.central.failed.is_none()
    }
}

/// Empties both the local sandbox's trash and the authoritative
/// trash the principal can see, independently. Neither side is rolled
/// back by the other's failure — each store's trash only ever held
/// items in that store, so a partial failure just means "some items
/// are still sitting in one store's trash", never a split item.
pub async fn empty_recycle_bin(local: &Arc<dyn Repository>, central: &Arc<dyn Repository>, principal: &Principal) -> Result<EmptyTrashReport> {
    Ok(EmptyTrashReport {
        local: empty_one_store(local, principal, "local").await,
        central: empty_one_store(central, principal, "authoritative").await,
    })
}

async fn empty_one_store(repo: &Arc<dyn Repository>, principal: &Principal, store_label: &str) -> StoreEmptyResult {
    let entries = match repo.list_trash(principal).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(store = store_label, error = %e, "failed to list trash while emptying recycle bin");
            return StoreEmptyResult { purged: 0, failed: Some(e.to_string()) };
        }
    };

    let mut purged = 0;
    for entry in entries {
        match repo.purge(principal, entry.trash_id).await {
            Ok(()) => purged += 1,
            Err(e) => {
                warn!(store = store_label, trash_id = %entry.trash_id, error = %e, "failed to purge trash item while emptying recycle bin");
                return StoreEmptyResult { purged, failed: Some(format!("{store_label}: {e}")) };
            }
        }
    }
    StoreEmptyResult { purged, failed: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::db::entities::file::FileFormat;
    use crate::domain::EntityKind;
    use crate::principal::Principal;
    use crate::repository::LocalBackend;
    use uuid::Uuid;

    async fn new_store() -> (Arc<dyn Repository>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_sqlite(&dir.path().join("store.db")).await.unwrap();
        db.migrate().await.unwrap();
        (Arc::new(LocalBackend::new(db.conn().clone(), 30)), dir)
    }

    /// Spec §8 scenario 6: emptying both stores' trash purges each
    /// store's soft-deleted items independently and reports success for
    /// both when neither fails.
    #[tokio::test]
    async fn empties_both_stores_independently() {
        let (local, _local_dir) = new_store().await;
        let (central, _central_dir) = new_store().await;
        let admin = Principal::admin(Uuid::new_v4());

        let local_project = local.create_project(&admin, "Game", None, false).await.unwrap();
        let local_file = local.create_file(&admin, "a.txt", local_project, None, FileFormat::Txt).await.unwrap();
        local.soft_delete(&admin, EntityKind::File, local_file).await.unwrap();

        let central_project = central.create_project(&admin, "Game", None, false).await.unwrap();
        let central_file = central.create_file(&admin, "b.txt", central_project, None, FileFormat::Txt).await.unwrap();
        central.soft_delete(&admin, EntityKind::File, central_file).await.unwrap();

        let report = empty_recycle_bin(&local, &central, &admin).await.unwrap();
        assert!(report.fully_succeeded());
        assert_eq!(report.local.purged, 1);
        assert_eq!(report.central.purged, 1);

        assert!(local.list_trash(&admin).await.unwrap().is_empty());
        assert!(central.list_trash(&admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_trash_on_an_empty_store_purges_nothing() {
        let (local, _local_dir) = new_store().await;
        let (central, _central_dir) = new_store().await;
        let admin = Principal::admin(Uuid::new_v4());

        let report = empty_recycle_bin(&local, &central, &admin).await.unwrap();
        assert!(report.fully_succeeded());
        assert_eq!(report.local.purged, 0);
        assert_eq!(report.central.purged, 0);
    }
}
