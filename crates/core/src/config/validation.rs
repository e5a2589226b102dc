//! Configuration validation rules.
//!
//! This module provides validation logic for `CacheConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::CacheConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `filename` is empty or contains a path separator
    /// - `busy_timeout_ms` exceeds one minute
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filename.is_empty() {
            return Err(ConfigError::Invalid { field: "filename".into(), reason: "must not be empty".into() });
        }
        if self.filename.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                field: "filename".into(),
                reason: "must be a bare file name, use dir for the location".into(),
            });
        }

        if self.busy_timeout_ms > 60_000 {
            return Err(ConfigError::Invalid {
                field: "busy_timeout_ms".into(),
                reason: "must not exceed 1 minute (60000ms)".into(),
            });
        }

        if self.busy_timeout_ms == 0 {
            tracing::warn!("busy_timeout_ms is 0; concurrent writers will fail immediately on a locked file");
        }

        Ok(())
    }
}
