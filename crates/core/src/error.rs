//! Unified error types for lfcache.
//!
//! The public `get`/`set` calls never hand these to callers; they surface
//! through [`crate::Cache::lookup`] and [`crate::Cache::try_set`] for
//! diagnostics.

use tokio_rusqlite::rusqlite;

use crate::config::ConfigError;

/// Unified error types for the cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database operation failed (open, query, mutation, commit).
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Keys must be non-empty.
    #[error("INVALID_KEY: key must not be empty")]
    InvalidKey,

    /// Table or column name is not a plain SQL identifier.
    #[error("INVALID_IDENTIFIER: {0}")]
    InvalidIdentifier(String),

    /// A stored row has a NULL where a value is required.
    #[error("MALFORMED_ROW: {0}")]
    MalformedRow(String),

    /// Configuration could not be loaded or failed validation.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
