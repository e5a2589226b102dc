//! Cache table layout.
//!
//! The schema is created on write rather than at a fixed initialization
//! point: every `set` calls [`ensure`], which only issues
//! `CREATE ... IF NOT EXISTS` statements.

use super::connection::Store;
use crate::Error;

/// Table holding all cache entries.
pub const TABLE: &str = "cache";

/// Column definition of [`TABLE`]. `timestamp` is the expiration time in
/// unix seconds, 0 meaning the entry never expires.
pub const DEFINITION: &str = "
    key         TEXT NOT NULL,
    value       TEXT NOT NULL,
    timestamp   INT NOT NULL
";

/// Make sure the cache table and its unique key index exist.
pub async fn ensure(store: &Store) -> Result<(), Error> {
    store.create_table(TABLE, DEFINITION).await?;
    store.create_index(TABLE, &["key"], true).await?;
    Ok(())
}
