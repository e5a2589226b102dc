//! SQLite-backed key-value cache with lazy expiration.
//!
//! This module provides a durable string cache persisted to a single SQLite
//! file via tokio-rusqlite. It supports:
//!
//! - Absolute expiration timestamps, checked only when a key is read
//! - Opportunistic removal of all expired rows on an expired hit
//! - Single-statement upserts guarded by a unique key index
//! - Schema creation on first write

pub mod connection;
pub mod entries;
pub mod schema;

pub use crate::Error;

pub use connection::{OpenMode, Store};
pub use entries::{Cache, CacheEntry, Lookup, NEVER, expires_in, now};
