//! Uniqueness and lookup indexes backing the spec §3/§8 invariants:
//! sibling-name uniqueness, `(file_id, index)` density, `(tm_id,
//! source_hash)` dedup, and the normalized-source lookup path.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_folders_siblings")
                    .table(Folders::Table)
                    .col(Folders::ProjectId)
                    .col(Folders::ParentFolderId)
                    .col(Folders::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_files_siblings")
                    .table(Files::Table)
                    .col(Files::ProjectId)
                    .col(Files::FolderId)
                    .col(Files::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rows_file_index")
                    .table(Rows::Table)
                    .col(Rows::FileId)
                    .col(Rows::Index)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tms_name_project")
                    .table(Tms::Table)
                    .col(Tms::Name)
                    .col(Tms::ProjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tm_entries_hash")
                    .table(TmEntries::Table)
                    .col(TmEntries::TmId)
                    .col(TmEntries::SourceHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sync_subscriptions_unique")
                    .table(SyncSubscriptions::Table)
                    .col(SyncSubscriptions::UserId)
                    .col(SyncSubscriptions::ItemType)
                    .col(SyncSubscriptions::ItemId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_trash_items_expiry")
                    .table(TrashItems::Table)
                    .col(TrashItems::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_folders_siblings",
            "idx_files_siblings",
            "idx_rows_file_index",
            "idx_tms_name_project",
            "idx_tm_entries_hash",
            "idx_sync_subscriptions_unique",
            "idx_trash_items_expiry",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Folders {
    Table,
    ProjectId,
    ParentFolderId,
    Name,
}

#[derive(DeriveIden)]
enum Files {
    Table,
    ProjectId,
    FolderId,
    Name,
}

#[derive(DeriveIden)]
enum Rows {
    Table,
    FileId,
    Index,
}

#[derive(DeriveIden)]
enum Tms {
    Table,
    Name,
    ProjectId,
}

#[derive(DeriveIden)]
enum TmEntries {
    Table,
    TmId,
    SourceHash,
}

#[derive(DeriveIden)]
enum SyncSubscriptions {
    Table,
    UserId,
    ItemType,
    ItemId,
}

#[derive(DeriveIden)]
enum TrashItems {
    Table,
    ExpiresAt,
}
