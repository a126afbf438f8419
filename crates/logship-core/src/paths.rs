//! File system paths for logship.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory name used under the platform cache and home directories.
const APP_DIR_NAME: &str = "logship";

/// Manages file system paths for logship.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for configuration and logs (~/.logship)
    base_dir: PathBuf,
    /// Directory holding the persistent delivery cache
    cache_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance.
    ///
    /// Uses `~/.logship` for configuration and the platform cache directory
    /// (e.g. `~/.cache/logship`) for the delivery cache.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        let base_dir = home.join(format!(".{APP_DIR_NAME}"));
        let cache_dir = dirs::cache_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .unwrap_or_else(|| base_dir.join("cache"));

        Ok(Self { base_dir, cache_dir })
    }

    /// Create a new Paths instance rooted at a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            cache_dir: base_dir.join("cache"),
            base_dir,
        }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Get the config file path (~/.logship/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the persistent cache database path.
    pub fn cache_database_file(&self) -> PathBuf {
        self.cache_dir.join("cache.sqlite")
    }

    /// Get the JSONL log file path (~/.logship/logs/logship.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.base_dir.join("logs").join("logship.jsonl")
    }

    /// Ensure the base and cache directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(&self.cache_dir)?;
        Ok(())
    }
}
