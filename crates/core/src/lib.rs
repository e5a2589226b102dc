//! Core types and shared functionality for lfcache.
//!
//! This crate provides:
//! - File-backed key-value cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{Cache, CacheEntry, Lookup};
pub use config::CacheConfig;
pub use error::Error;
