//! Storage adapter over a single SQLite file.
//!
//! A [`Store`] wraps one tokio-rusqlite connection. Every operation reports
//! failure as an `Err` and never panics; [`Store::close`] swallows errors so it
//! is always safe to call during cleanup. Mutating statements open a
//! transaction lazily and nothing they do is durable until [`Store::commit`].

use std::path::Path;
use std::time::Duration;

use crate::Error;
use tokio_rusqlite::rusqlite::{self, OpenFlags, Row, types::Value};
use tokio_rusqlite::Connection;

/// How [`Store::connect`] treats a missing database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open or create the file.
    Create,
    /// Open an existing file only; a missing file is an error.
    Existing,
}

impl OpenMode {
    fn flags(self) -> OpenFlags {
        let base = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            OpenMode::Create => base | OpenFlags::SQLITE_OPEN_CREATE,
            OpenMode::Existing => base,
        }
    }
}

/// Database handle for one cache file.
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open the database at `dir/filename`.
    ///
    /// Applies `busy_timeout` so a writer holding the file lock makes this
    /// connection wait instead of failing straight away.
    pub async fn connect(
        dir: impl AsRef<Path>, filename: &str, mode: OpenMode, busy_timeout: Duration,
    ) -> Result<Self, Error> {
        let path = dir.as_ref().join(filename);
        let conn = Connection::open_with_flags(&path, mode.flags())
            .await
            .map_err(|e| Error::Database(e.into()))?;

        conn.call(move |conn| conn.busy_timeout(busy_timeout))
            .await
            .map_err(Error::Database)?;

        Ok(Self { conn })
    }

    /// Create `table` with the given column definition unless it exists.
    pub async fn create_table(&self, table: &str, definition: &str) -> Result<(), Error> {
        let sql = format!("CREATE TABLE IF NOT EXISTS {} ({definition})", identifier(table)?);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Create an index named `idx_<table>_<columns>` unless it exists.
    pub async fn create_index(&self, table: &str, columns: &[&str], unique: bool) -> Result<(), Error> {
        let table = identifier(table)?;
        if columns.is_empty() {
            return Err(Error::InvalidIdentifier("index needs at least one column".into()));
        }
        let columns = columns.iter().map(|c| identifier(c)).collect::<Result<Vec<_>, _>>()?;

        let sql = format!(
            "CREATE {}INDEX IF NOT EXISTS idx_{table}_{} ON {table} ({})",
            if unique { "UNIQUE " } else { "" },
            columns.join("_"),
            columns.join(", "),
        );
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Run a parameterized query and map every row.
    pub async fn select<T, F>(&self, sql: &str, params: Vec<Value>, map: F) -> Result<Vec<T>, Error>
    where
        T: Send + 'static,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<T>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params.iter()), map)?
                    .collect::<rusqlite::Result<Vec<T>>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }

    /// Run a parameterized query and map the first row, if any.
    pub async fn select_one<T, F>(&self, sql: &str, params: Vec<Value>, mut map: F) -> Result<Option<T>, Error>
    where
        T: Send + 'static,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| -> Result<Option<T>, Error> {
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
                let first = rows.next()?.map(|row| map(row)).transpose()?;
                Ok(first)
            })
            .await
            .map_err(Error::from)
    }

    /// Run a mutating statement (insert, upsert, replace).
    ///
    /// Returns the number of affected rows.
    pub async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<usize, Error> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                if conn.is_autocommit() {
                    conn.execute_batch("BEGIN")?;
                }
                let count = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
                Ok(count)
            })
            .await
            .map_err(Error::from)
    }

    /// Run a delete statement.
    ///
    /// Returns the number of deleted rows.
    pub async fn delete(&self, sql: &str, params: Vec<Value>) -> Result<usize, Error> {
        self.execute(sql, params).await
    }

    /// Commit the open transaction, if any.
    pub async fn commit(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                if !conn.is_autocommit() {
                    conn.execute_batch("COMMIT")?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Close the connection, rolling back anything uncommitted.
    ///
    /// Never fails; problems are logged.
    pub async fn close(self) {
        let rollback = self
            .conn
            .call(|conn| -> Result<(), Error> {
                if !conn.is_autocommit() {
                    conn.execute_batch("ROLLBACK")?;
                }
                Ok(())
            })
            .await
            .map_err(Error::from);
        if let Err(e) = rollback {
            tracing::warn!(error = %e, "Rollback on close failed");
        }

        if let Err(e) = self.conn.close().await {
            tracing::warn!(error = %e, "Closing cache database failed");
        }
    }
}

/// Accept only plain SQL identifiers so table and column names can be
/// interpolated into DDL.
fn identifier(name: &str) -> Result<&str, Error> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1_000);

    async fn open(dir: &Path) -> Store {
        Store::connect(dir, "test.db", OpenMode::Create, TIMEOUT).await.unwrap()
    }

    async fn table_names(store: &Store) -> Vec<String> {
        store
            .select(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                vec![],
                |row| row.get(0),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path()).await;
        store.create_table("items", "name TEXT NOT NULL").await.unwrap();
        store.close().await;
        assert!(dir.path().join("test.db").exists());
    }

    #[tokio::test]
    async fn test_connect_existing_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Store::connect(dir.path(), "missing.db", OpenMode::Existing, TIMEOUT).await;
        assert!(matches!(result, Err(Error::Database(_))));
        assert!(!dir.path().join("missing.db").exists());
    }

    #[tokio::test]
    async fn test_create_table_and_index_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path()).await;

        for _ in 0..2 {
            store.create_table("items", "name TEXT NOT NULL").await.unwrap();
            store.create_index("items", &["name"], true).await.unwrap();
        }

        assert_eq!(table_names(&store).await, vec!["items".to_string()]);

        let indexes: Vec<String> = store
            .select("SELECT name FROM sqlite_master WHERE type = 'index'", vec![], |row| row.get(0))
            .await
            .unwrap();
        assert_eq!(indexes, vec!["idx_items_name".to_string()]);
        store.close().await;
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path()).await;
        store.create_table("items", "name TEXT NOT NULL").await.unwrap();
        store.create_index("items", &["name"], true).await.unwrap();

        let insert = "INSERT INTO items (name) VALUES (?1)";
        store.execute(insert, vec![Value::from("a".to_string())]).await.unwrap();
        let duplicate = store.execute(insert, vec![Value::from("a".to_string())]).await;
        assert!(duplicate.is_err());
        store.close().await;
    }

    #[tokio::test]
    async fn test_rejects_invalid_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path()).await;

        let table = store.create_table("items; DROP TABLE x", "name TEXT").await;
        assert!(matches!(table, Err(Error::InvalidIdentifier(_))));

        store.create_table("items", "name TEXT").await.unwrap();
        let index = store.create_index("items", &["name)"], false).await;
        assert!(matches!(index, Err(Error::InvalidIdentifier(_))));

        let empty = store.create_index("items", &[], false).await;
        assert!(matches!(empty, Err(Error::InvalidIdentifier(_))));
        store.close().await;
    }

    #[tokio::test]
    async fn test_select_one_returns_first_row_or_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path()).await;
        store.create_table("items", "name TEXT NOT NULL").await.unwrap();
        store
            .execute("INSERT INTO items (name) VALUES ('a'), ('b')", vec![])
            .await
            .unwrap();
        store.commit().await.unwrap();

        let first: Option<String> = store
            .select_one("SELECT name FROM items ORDER BY name", vec![], |row| row.get(0))
            .await
            .unwrap();
        assert_eq!(first.as_deref(), Some("a"));

        let none: Option<String> = store
            .select_one("SELECT name FROM items WHERE name = ?1", vec![Value::from("z".to_string())], |row| {
                row.get(0)
            })
            .await
            .unwrap();
        assert!(none.is_none());
        store.close().await;
    }

    #[tokio::test]
    async fn test_select_on_missing_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path()).await;
        let result = store
            .select_one("SELECT name FROM nowhere", vec![], |row| row.get::<_, String>(0))
            .await;
        assert!(matches!(result, Err(Error::Database(_))));
        store.close().await;
    }

    #[tokio::test]
    async fn test_uncommitted_changes_are_rolled_back_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path()).await;
        store.create_table("items", "name TEXT NOT NULL").await.unwrap();
        store
            .execute("INSERT INTO items (name) VALUES (?1)", vec![Value::from("kept".to_string())])
            .await
            .unwrap();
        store.commit().await.unwrap();
        store
            .execute("INSERT INTO items (name) VALUES (?1)", vec![Value::from("dropped".to_string())])
            .await
            .unwrap();
        store.close().await;

        let store = open(dir.path()).await;
        let names: Vec<String> = store
            .select("SELECT name FROM items", vec![], |row| row.get(0))
            .await
            .unwrap();
        assert_eq!(names, vec!["kept".to_string()]);
        store.close().await;
    }

    #[tokio::test]
    async fn test_delete_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path()).await;
        store.create_table("items", "n INT NOT NULL").await.unwrap();
        store
            .execute("INSERT INTO items (n) VALUES (1), (2), (3)", vec![])
            .await
            .unwrap();

        let deleted = store
            .delete("DELETE FROM items WHERE n <= ?1", vec![Value::from(2_i64)])
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        store.commit().await.unwrap();
        store.close().await;
    }

    #[tokio::test]
    async fn test_commit_without_transaction_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path()).await;
        store.commit().await.unwrap();
        store.close().await;
    }

    #[test]
    fn test_identifier_rules() {
        assert!(identifier("cache").is_ok());
        assert!(identifier("_private_1").is_ok());
        assert!(identifier("").is_err());
        assert!(identifier("1st").is_err());
        assert!(identifier("key value").is_err());
    }
}
