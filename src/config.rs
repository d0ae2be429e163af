use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which production records the duplicate scan walks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanScope {
    /// Every production record, including ones already soft-deleted.
    AllProduction,
    /// Only production records with no soft-delete flag set.
    LiveProduction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub pool_max_size: u32,
    pub pool_connection_timeout_secs: u64,
    pub photo_dir: PathBuf,
    pub sweep_interval_minutes: u64,
    pub purge_workers: usize,
    pub scan_scope: ScanScope,
    pub orphan_sweep_enabled: bool,
    pub orphan_min_age_minutes: u64,
    pub shutdown_grace_secs: u64,
}

impl AppConfig {
    pub fn sweep_interval(&self) -> Duration {
        minutes(self.sweep_interval_minutes)
    }

    pub fn orphan_min_age(&self) -> Duration {
        minutes(self.orphan_min_age_minutes)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn pool_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_connection_timeout_secs)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.sweep_interval_minutes == 0 {
            return Err(ConfigError::Message(
                "sweep_interval_minutes must be greater than zero".to_string(),
            ));
        }
        for (key, value) in [
            ("sweep_interval_minutes", self.sweep_interval_minutes),
            ("orphan_min_age_minutes", self.orphan_min_age_minutes),
        ] {
            if value.checked_mul(60).is_none() {
                return Err(ConfigError::Message(format!("{} is out of range", key)));
            }
        }
        if self.purge_workers == 0 {
            return Err(ConfigError::Message(
                "purge_workers must be greater than zero".to_string(),
            ));
        }
        if self.pool_max_size == 0 {
            return Err(ConfigError::Message(
                "pool_max_size must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from(None)
}

/// Layering: built-in defaults, then `Config.toml` (or `file` when given),
/// then `SWEEP_*` environment variables. `DATABASE_URL` fills in the
/// connection string when nothing else does.
pub fn load_configuration_from(file: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        .set_default("pool_max_size", 20)?
        .set_default("pool_connection_timeout_secs", 30)?
        .set_default("photo_dir", "./uploadedImages")?
        .set_default("sweep_interval_minutes", 70)?
        .set_default("purge_workers", 4)?
        .set_default("scan_scope", "all_production")?
        .set_default("orphan_sweep_enabled", true)?
        .set_default("orphan_min_age_minutes", 1440)?
        .set_default("shutdown_grace_secs", 30)?;

    if let Ok(url) = env::var("DATABASE_URL") {
        builder = builder.set_default("database_url", url)?;
    }

    builder = match file {
        Some(path) => builder.add_source(ConfigFile::from(path).required(true)),
        None => builder.add_source(ConfigFile::with_name("Config").required(false)),
    };

    let config = builder
        .add_source(Environment::with_prefix("SWEEP").try_parsing(true))
        .build()?;

    config.try_deserialize::<AppConfig>()?.validate()
}
