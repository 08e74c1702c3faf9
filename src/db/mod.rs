//! Database infrastructure shared by both repository backends.
//!
//! The `entities` module defines the schema once; `Database::open_sqlite`
//! and `Database::open_postgres` connect the same schema to the local
//! and authoritative backends respectively. Application-level
//! uniqueness checks (sibling names, TM `(name, project)`) run inside
//! the same transaction as the mutating write, since a `NULL` parent
//! column makes a plain unique index insufficient on its own (both
//! SQLite and Postgres treat `NULL <> NULL` in uniqueness terms).

pub mod entities;
pub mod migration;

use crate::error::{Error, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database as SeaDatabase, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub struct Database {
    conn: DatabaseConnection,
}

impl Database {
    /// Open (creating if absent) the embedded SQLite database backing
    /// the local, single-user store.
    pub async fn open_sqlite(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let mut opt = ConnectOptions::new(url);
        opt.max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt).await?;
        for pragma in [
            "PRAGMA journal_mode=WAL",
            "PRAGMA synchronous=NORMAL",
            "PRAGMA foreign_keys=ON",
        ] {
            conn.execute(Statement::from_string(sea_orm::DatabaseBackend::Sqlite, pragma))
                .await?;
        }
        info!("opened local database at {:?}", path);
        Ok(Self { conn })
    }

    /// Connect to the authoritative PostgreSQL database.
    pub async fn open_postgres(url: &str) -> Result<Self> {
        let mut opt = ConnectOptions::new(url.to_string());
        opt.max_connections(32)
            .min_connections(4)
            .connect_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt).await?;
        // Accelerates the fuzzy-character tier (spec §4.2).
        let _ = conn
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                "CREATE EXTENSION IF NOT EXISTS pg_trgm",
            ))
            .await;
        info!("connected to authoritative database");
        Ok(Self { conn })
    }

    pub async fn migrate(&self) -> Result<()> {
        migration::Migrator::up(&self.conn, None)
            .await
            .map_err(Error::from)
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}
