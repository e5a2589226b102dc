//! Cache configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LFCACHE_*)
//! 2. TOML config file (if LFCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Default database file name, shared with other plugins writing the same cache.
pub const DEFAULT_FILENAME: &str = "linuxfabrik-plugin-cache.db";

/// Location and locking behaviour of the cache database.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LFCACHE_*)
/// 2. TOML config file (if LFCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the database file.
    ///
    /// Set via LFCACHE_DIR environment variable. Defaults to the process
    /// temp directory.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Database file name inside `dir`.
    ///
    /// Set via LFCACHE_FILENAME environment variable.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// How long to wait on a locked database file, in milliseconds.
    ///
    /// Set via LFCACHE_BUSY_TIMEOUT_MS environment variable.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_filename() -> String {
    DEFAULT_FILENAME.into()
}

fn default_busy_timeout_ms() -> u64 {
    1_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { dir: default_dir(), filename: default_filename(), busy_timeout_ms: default_busy_timeout_ms() }
    }
}

impl CacheConfig {
    /// Busy timeout as Duration for use with rusqlite.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LFCACHE_`
    /// 2. TOML file from `LFCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LFCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("LFCACHE_")
                .map(|key| key.as_str().to_lowercase().into()),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
