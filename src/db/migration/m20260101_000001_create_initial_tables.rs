//! Initial migration — creates every table in the spec §3 data model.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Platforms::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Platforms::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Platforms::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(Platforms::Description).string())
                    .col(ColumnDef::new(Platforms::IsRestricted).boolean().not_null().default(false))
                    .col(ColumnDef::new(Platforms::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::PlatformId).uuid())
                    .col(ColumnDef::new(Projects::IsRestricted).boolean().not_null().default(false))
                    .col(ColumnDef::new(Projects::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Projects::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Projects::Table, Projects::PlatformId)
                            .to(Platforms::Table, Platforms::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Folders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Folders::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Folders::Name).string().not_null())
                    .col(ColumnDef::new(Folders::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Folders::ParentFolderId).uuid())
                    .col(ColumnDef::new(Folders::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Folders::Table, Folders::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Files::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Files::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Files::Name).string().not_null())
                    .col(ColumnDef::new(Files::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(Files::FolderId).uuid())
                    .col(ColumnDef::new(Files::Format).string_len(8).not_null())
                    .col(ColumnDef::new(Files::RowCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Files::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Files::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Files::Table, Files::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Files::Table, Files::FolderId)
                            .to(Folders::Table, Folders::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rows::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rows::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Rows::FileId).uuid().not_null())
                    .col(ColumnDef::new(Rows::Index).integer().not_null())
                    .col(ColumnDef::new(Rows::Source).text().not_null())
                    .col(ColumnDef::new(Rows::Target).text().not_null())
                    .col(ColumnDef::new(Rows::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Rows::StringId).text())
                    .col(ColumnDef::new(Rows::Metadata).json())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Rows::Table, Rows::FileId)
                            .to(Files::Table, Files::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tms::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tms::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tms::Name).string().not_null())
                    .col(ColumnDef::new(Tms::ProjectId).uuid())
                    .col(ColumnDef::new(Tms::SourceLang).string_len(16).not_null())
                    .col(ColumnDef::new(Tms::TargetLang).string_len(16).not_null())
                    .col(ColumnDef::new(Tms::Description).string())
                    .col(ColumnDef::new(Tms::EntryCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Tms::IsActive).boolean().not_null().default(false))
                    .col(ColumnDef::new(Tms::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Tms::Table, Tms::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TmEntries::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TmEntries::EntryId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(TmEntries::TmId).uuid().not_null())
                    .col(ColumnDef::new(TmEntries::Source).text().not_null())
                    .col(ColumnDef::new(TmEntries::Target).text().not_null())
                    .col(ColumnDef::new(TmEntries::NormalizedSource).text().not_null())
                    .col(ColumnDef::new(TmEntries::SourceHash).string_len(64).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(TmEntries::Table, TmEntries::TmId)
                            .to(Tms::Table, Tms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Operations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Operations::OpId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Operations::UserId).uuid().not_null())
                    .col(ColumnDef::new(Operations::Tool).string().not_null())
                    .col(ColumnDef::new(Operations::Function).string().not_null())
                    .col(ColumnDef::new(Operations::DisplayName).string().not_null())
                    .col(ColumnDef::new(Operations::State).string_len(16).not_null())
                    .col(ColumnDef::new(Operations::Progress).integer().not_null().default(0))
                    .col(ColumnDef::new(Operations::StepText).string())
                    .col(ColumnDef::new(Operations::StartedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Operations::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Operations::FileInfo).json())
                    .col(ColumnDef::new(Operations::Error).json())
                    .col(ColumnDef::new(Operations::Result).json())
                    .col(ColumnDef::new(Operations::LastSeq).big_integer().not_null().default(0))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TrashItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TrashItems::TrashId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(TrashItems::ItemType).string_len(16).not_null())
                    .col(ColumnDef::new(TrashItems::ItemId).uuid().not_null())
                    .col(ColumnDef::new(TrashItems::ItemName).string().not_null())
                    .col(ColumnDef::new(TrashItems::ParentProjectId).uuid())
                    .col(ColumnDef::new(TrashItems::ParentFolderId).uuid())
                    .col(ColumnDef::new(TrashItems::Snapshot).json().not_null())
                    .col(ColumnDef::new(TrashItems::DeletedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(TrashItems::ExpiresAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Sessions::SessionId).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Sessions::UserId).uuid().not_null())
                    .col(ColumnDef::new(Sessions::MachineId).string().not_null())
                    .col(ColumnDef::new(Sessions::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Sessions::LastHeartbeat).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SyncSubscriptions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SyncSubscriptions::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(SyncSubscriptions::UserId).uuid().not_null())
                    .col(ColumnDef::new(SyncSubscriptions::ItemType).string_len(16).not_null())
                    .col(ColumnDef::new(SyncSubscriptions::ItemId).uuid().not_null())
                    .col(ColumnDef::new(SyncSubscriptions::SubscribedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(SyncSubscriptions::LastSyncedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuditEvents::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AuditEvents::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(AuditEvents::Ts).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(AuditEvents::Kind).string().not_null())
                    .col(ColumnDef::new(AuditEvents::Principal).uuid())
                    .col(ColumnDef::new(AuditEvents::Ip).string())
                    .col(ColumnDef::new(AuditEvents::Detail).json().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            AuditEvents::Table.into_table_ref(),
            SyncSubscriptions::Table.into_table_ref(),
            Sessions::Table.into_table_ref(),
            TrashItems::Table.into_table_ref(),
            Operations::Table.into_table_ref(),
            TmEntries::Table.into_table_ref(),
            Tms::Table.into_table_ref(),
            Rows::Table.into_table_ref(),
            Files::Table.into_table_ref(),
            Folders::Table.into_table_ref(),
            Projects::Table.into_table_ref(),
            Platforms::Table.into_table_ref(),
        ] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Platforms {
    Table,
    Id,
    Name,
    Description,
    IsRestricted,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    Name,
    PlatformId,
    IsRestricted,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Folders {
    Table,
    Id,
    Name,
    ProjectId,
    ParentFolderId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Files {
    Table,
    Id,
    Name,
    ProjectId,
    FolderId,
    Format,
    RowCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Rows {
    Table,
    Id,
    FileId,
    Index,
    Source,
    Target,
    Status,
    StringId,
    Metadata,
}

#[derive(DeriveIden)]
enum Tms {
    Table,
    Id,
    Name,
    ProjectId,
    SourceLang,
    TargetLang,
    Description,
    EntryCount,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TmEntries {
    Table,
    EntryId,
    TmId,
    Source,
    Target,
    NormalizedSource,
    SourceHash,
}

#[derive(DeriveIden)]
enum Operations {
    Table,
    OpId,
    UserId,
    Tool,
    Function,
    DisplayName,
    State,
    Progress,
    StepText,
    StartedAt,
    CompletedAt,
    FileInfo,
    Error,
    Result,
    LastSeq,
}

#[derive(DeriveIden)]
enum TrashItems {
    Table,
    TrashId,
    ItemType,
    ItemId,
    ItemName,
    ParentProjectId,
    ParentFolderId,
    Snapshot,
    DeletedAt,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum Sessions {
    Table,
    SessionId,
    UserId,
    MachineId,
    CreatedAt,
    LastHeartbeat,
}

#[derive(DeriveIden)]
enum SyncSubscriptions {
    Table,
    Id,
    UserId,
    ItemType,
    ItemId,
    SubscribedAt,
    LastSyncedAt,
}

#[derive(DeriveIden)]
enum AuditEvents {
    Table,
    Id,
    Ts,
    Principal,
    Kind,
    Ip,
    Detail,
}
