//! Process-wide handles, built once at startup and passed down
//! explicitly rather than reached for through globals (spec §9
//! "global mutable state... initialized once at startup, passed
//! explicitly through the call graph, torn down deterministically in
//! reverse order").

use crate::audit::AuditSink;
use crate::config::{AppConfig, DatabaseMode};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::jobs::{ProgressBus, Scheduler};
use crate::repository::{AuthoritativeBackend, LocalBackend, Repository};
use crate::tm::cascade::{FuzzyScorer, PgTrgmScorer, StrsimScorer};
use crate::tm::engine::TmEngine;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

/// Everything a request handler or background job needs, resolved
/// once. `local` is always present — the offline sandbox exists
/// whether or not this process is ever actually offline — while
/// `central` is only populated when a remote authoritative database is
/// configured, which is what makes the sync engine usable at all.
pub struct CoreContext {
    pub config: AppConfig,
    pub local_db: DatabaseConnection,
    pub central_db: Option<DatabaseConnection>,
    /// Whichever of `local_db`/`central_db` backs `primary` — handed
    /// to jobs that need a raw connection alongside the repository
    /// (e.g. `PretranslationJob`, which reads file rows directly).
    pub primary_db: DatabaseConnection,
    pub local: Arc<dyn Repository>,
    pub central: Option<Arc<dyn Repository>>,
    /// The store `request::*` operations act on by default; which one
    /// that is follows `config.database.mode`.
    pub primary: Arc<dyn Repository>,
    pub tm: Arc<TmEngine>,
    pub scheduler: Arc<Scheduler>,
    pub bus: Arc<ProgressBus>,
    pub audit: AuditSink,
}

impl CoreContext {
    pub async fn bootstrap(config: AppConfig) -> Result<Self> {
        config.ensure_directories()?;

        let local_database = Database::open_sqlite(&config.local_db_path()).await?;
        local_database.migrate().await?;
        let local_db = local_database.conn().clone();
        let local: Arc<dyn Repository> = Arc::new(LocalBackend::new(local_db.clone(), config.trash.retention_days));

        let (central_db, central): (Option<DatabaseConnection>, Option<Arc<dyn Repository>>) = match &config.database.url {
            Some(url) => {
                let central_database = Database::open_postgres(url).await?;
                central_database.migrate().await?;
                let conn = central_database.conn().clone();
                let repo: Arc<dyn Repository> = Arc::new(AuthoritativeBackend::new(conn.clone(), config.trash.retention_days));
                (Some(conn), Some(repo))
            }
            None => {
                if matches!(config.database.mode, DatabaseMode::Authoritative) {
                    return Err(Error::invalid("database.mode is authoritative but no database.url is configured"));
                }
                (None, None)
            }
        };

        let primary = match config.database.mode {
            DatabaseMode::Authoritative => central.clone().expect("checked above"),
            DatabaseMode::Local => local.clone(),
        };

        let primary_db = match config.database.mode {
            DatabaseMode::Authoritative => central_db.clone().expect("checked above"),
            DatabaseMode::Local => local_db.clone(),
        };

        let bus = Arc::new(ProgressBus::new());
        let audit = AuditSink::new(primary_db.clone());
        // The fuzzy tier dispatches to the primary backend's native
        // text-similarity facility (spec §4.2): pg_trgm on Postgres,
        // in-process Jaro-Winkler on SQLite. Semantic embedders are an
        // external collaborator with no in-tree default, so both tiers
        // start disabled until a caller wires one in via `TmEngine`.
        let fuzzy_scorer: Arc<dyn FuzzyScorer> = match config.database.mode {
            DatabaseMode::Authoritative => Arc::new(PgTrgmScorer),
            DatabaseMode::Local => Arc::new(StrsimScorer),
        };
        let tm = Arc::new(TmEngine::new(primary_db.clone(), config.tm_index_dir(), fuzzy_scorer, None, None));
        let scheduler = Arc::new(Scheduler::new(
            primary_db.clone(),
            bus.clone(),
            audit.clone(),
            config.scheduler.pool_size,
            config.scheduler.per_class_max.clone(),
        ));

        info!(mode = ?config.database.mode, has_central = central.is_some(), "core context ready");

        Ok(Self {
            config,
            local_db,
            central_db,
            primary_db,
            local,
            central,
            primary,
            tm,
            scheduler,
            bus,
            audit,
        })
    }

    /// Runs the periodic maintenance sweep (trash purge + expired
    /// operation cleanup). Callers drive this from a timer; it does
    /// not spawn its own.
    pub async fn run_maintenance(&self) -> Result<()> {
        let purged = self.primary.purge_expired().await?;
        let swept = self.scheduler.sweep_expired(self.config.scheduler.operation_retention_days).await?;
        info!(purged, swept, "maintenance sweep complete");
        Ok(())
    }
}
