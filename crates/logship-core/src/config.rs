//! Configuration management for logship.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default period between cache flush attempts (two minutes).
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 120;

/// Which cache store backend holds undelivered logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-lifetime queue; lost on exit.
    Memory,
    /// SQLite file; survives restarts.
    #[default]
    Sqlite,
}

impl FromStr for CacheBackend {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "sqlite" => Ok(CacheBackend::Sqlite),
            other => Err(CoreError::Config(format!("unknown cache backend: {other}"))),
        }
    }
}

/// Shipper configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipperConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds between flush attempts while the cache holds entries.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Cache store backend.
    #[serde(default)]
    pub cache_backend: CacheBackend,
    /// SQLite cache location. Falls back to the path from [`Paths`].
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_flush_interval_secs() -> u64 {
    DEFAULT_FLUSH_INTERVAL_SECS
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            cache_backend: CacheBackend::default(),
            cache_path: None,
        }
    }
}

impl ShipperConfig {
    /// Load configuration from the config file (if present), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ShipperConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply `LOGSHIP_*` overrides using the given variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> CoreResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("LOGSHIP_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(secs) = lookup("LOGSHIP_FLUSH_INTERVAL_SECS") {
            self.flush_interval_secs = secs.trim().parse().map_err(|_| {
                CoreError::Config(format!("LOGSHIP_FLUSH_INTERVAL_SECS is not a number: {secs}"))
            })?;
        }
        if let Some(backend) = lookup("LOGSHIP_CACHE_BACKEND") {
            self.cache_backend = backend.parse()?;
        }
        if let Some(path) = lookup("LOGSHIP_CACHE_PATH") {
            self.cache_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.flush_interval_secs == 0 {
            return Err(CoreError::Config(
                "flush_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Resolved SQLite cache path.
    pub fn cache_path(&self, paths: &Paths) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| paths.cache_database_file())
    }
}
