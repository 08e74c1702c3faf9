//! Application configuration.
//!
//! Every option enumerated in spec §6 lives here as a typed field with
//! the spec's stated default, loaded from a TOML file on disk with
//! environment-variable overrides (`LDM_<SECTION>_<FIELD>`).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseMode {
    Authoritative,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub mode: DatabaseMode,
    /// Connection URL for the authoritative backend, ignored in `local` mode.
    pub url: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            mode: DatabaseMode::Local,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub threshold_fuzzy: f32,
    pub threshold_semantic: f32,
    pub enable_deep: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            threshold_fuzzy: 0.85,
            threshold_semantic: 0.75,
            enable_deep: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerClassMax {
    pub indexing: usize,
    pub pretranslation: usize,
    pub upload: usize,
}

impl Default for PerClassMax {
    fn default() -> Self {
        Self {
            indexing: 1,
            pretranslation: 4,
            upload: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub pool_size: usize,
    pub per_class_max: PerClassMax,
    /// How long a completed operation's row and bus history survive
    /// before `sweep_expired` drops them (spec §4.3: "Retention for
    /// completed ops is 7 days"). Distinct from `trash.retention_days`.
    pub operation_retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 2 * num_cpus(),
            per_class_max: PerClassMax::default(),
            operation_retention_days: 7,
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashConfig {
    pub retention_days: i64,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub poll_interval_ms: u64,
    pub auto_on_file_open: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            auto_on_file_open: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: u32,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub tm: CascadeConfig,
    pub scheduler: SchedulerConfig,
    pub trash: TrashConfig,
    pub sync: SyncConfig,
}

const CONFIG_VERSION: u32 = 1;
const CONFIG_FILE_NAME: &str = "ldm.toml";

impl AppConfig {
    pub fn default_with_dir(data_dir: PathBuf) -> Self {
        Self {
            version: CONFIG_VERSION,
            data_dir,
            log_level: "info".to_string(),
            database: DatabaseConfig::default(),
            tm: CascadeConfig::default(),
            scheduler: SchedulerConfig::default(),
            trash: TrashConfig::default(),
            sync: SyncConfig::default(),
        }
    }

    /// Load configuration from `data_dir`, creating a default one if
    /// none exists yet.
    pub fn load_or_create(data_dir: &PathBuf) -> Result<Self> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);

        let mut config = if config_path.exists() {
            info!("loading config from {:?}", config_path);
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str(&raw).map_err(|e| Error::invalid(format!("config parse error: {e}")))?
        } else {
            warn!("no config found, creating default at {:?}", config_path);
            let config = Self::default_with_dir(data_dir.clone());
            config.save()?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(mode) = env::var("LDM_DATABASE_MODE") {
            self.database.mode = match mode.as_str() {
                "authoritative" => DatabaseMode::Authoritative,
                "local" => DatabaseMode::Local,
                other => {
                    warn!("ignoring unknown LDM_DATABASE_MODE={other}");
                    self.database.mode
                }
            };
        }
        if let Ok(url) = env::var("LDM_DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Ok(level) = env::var("LDM_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let config_path = self.data_dir.join(CONFIG_FILE_NAME);
        let raw = toml::to_string_pretty(self)
            .map_err(|e| Error::internal(format!("config serialize error: {e}")))?;
        std::fs::write(config_path, raw)?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.tm_index_dir())?;
        Ok(())
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn tm_index_dir(&self) -> PathBuf {
        self.data_dir.join("tm-indexes")
    }

    pub fn local_db_path(&self) -> PathBuf {
        self.data_dir.join("local.db")
    }
}

/// Platform-appropriate default data directory, mirroring the
/// teacher's `dirs`-based resolution.
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("ldm"))
        .ok_or_else(|| Error::internal("could not resolve a platform data directory"))
}
