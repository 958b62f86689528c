//! Storage layer for the tracking client.
//!
//! Two named stores back a client:
//! - the **queue store** holds the ordered snapshot of pending request URLs
//! - the **preference store** holds string-keyed values such as the active
//!   identity and the last device profile that was sent
//!
//! [`Database`] implements both on top of `rusqlite`; [`MemoryStore`]
//! implements both in memory for tests and ephemeral clients.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The client owns its store behind the same mutex that guards the queue, so
//! no extra synchronization is needed here.
//!
//! # Schema
//!
//! `pending_requests.position` is the delivery order. Each save rewrites the
//! whole table inside one transaction, so a crash mid-write leaves the
//! previous snapshot intact.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, params};
use thiserror::Error;

mod memory;

pub use memory::MemoryStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable snapshot of the pending-request queue.
pub trait QueueStore {
    /// Loads the persisted queue in delivery order.
    ///
    /// Null or unreadable entries are dropped. A store that was never
    /// written returns an empty list.
    fn load_queue(&mut self) -> Result<Vec<String>, StoreError>;

    /// Replaces the persisted queue with `queue`, atomically.
    fn save_queue(&mut self, queue: &[String]) -> Result<(), StoreError>;
}

/// Durable string-keyed preferences.
pub trait PreferenceStore {
    /// Loads every stored preference.
    fn load_preferences(&mut self) -> Result<BTreeMap<String, String>, StoreError>;

    /// Upserts `entries`, atomically.
    fn save_preferences(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError>;
}

/// A store providing both the queue and the preferences.
pub trait Storage: QueueStore + PreferenceStore + Send {}

impl<T> Storage for T where T: QueueStore + PreferenceStore + Send {}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            -- Pending requests in delivery order
            CREATE TABLE IF NOT EXISTS pending_requests (
                position INTEGER PRIMARY KEY,
                url TEXT
            );

            -- Identity and device profile
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Number of requests in the persisted snapshot.
    pub fn pending_count(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pending_requests", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl QueueStore for Database {
    fn load_queue(&mut self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT position, url FROM pending_requests ORDER BY position ASC")?;
        let mut rows = stmt.query([])?;
        let mut queue = Vec::new();
        let mut skipped = 0usize;
        while let Some(row) = rows.next()? {
            match row.get_ref(1)? {
                ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
                    Ok(url) if !url.is_empty() => queue.push(url.to_string()),
                    _ => skipped += 1,
                },
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "dropped unreadable queue entries");
        }
        Ok(queue)
    }

    fn save_queue(&mut self, queue: &[String]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM pending_requests", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO pending_requests (position, url) VALUES (?, ?)")?;
            for (position, url) in queue.iter().enumerate() {
                stmt.execute(params![position, url])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl PreferenceStore for Database {
    fn load_preferences(&mut self) -> Result<BTreeMap<String, String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM preferences ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((key, value))
        })?;
        let mut preferences = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            preferences.insert(key, value);
        }
        Ok(preferences)
    }

    fn save_preferences(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO preferences (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                ",
            )?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert_eq!(
            table_columns(&db.conn, "pending_requests"),
            vec!["position", "url"]
        );
        assert_eq!(table_columns(&db.conn, "preferences"), vec!["key", "value"]);
    }

    #[test]
    fn fresh_database_has_empty_queue() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        assert!(db.load_queue().unwrap().is_empty());
        assert!(db.load_preferences().unwrap().is_empty());
    }

    #[test]
    fn queue_order_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("trk.db");
        let queue = urls(&["https://h/e?n=1", "https://h/e?n=2", "https://h/e?n=3"]);

        {
            let mut db = Database::open(&path).unwrap();
            db.save_queue(&queue).unwrap();
        }

        let mut db = Database::open(&path).unwrap();
        assert_eq!(db.load_queue().unwrap(), queue);
        assert_eq!(db.pending_count().unwrap(), 3);
    }

    #[test]
    fn save_queue_replaces_previous_snapshot() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.save_queue(&urls(&["a", "b", "c"])).unwrap();
        db.save_queue(&urls(&["b", "c"])).unwrap();
        assert_eq!(db.load_queue().unwrap(), urls(&["b", "c"]));

        db.save_queue(&[]).unwrap();
        assert!(db.load_queue().unwrap().is_empty());
    }

    #[test]
    fn load_queue_skips_null_and_non_text_entries() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.conn
            .execute_batch(
                "
                INSERT INTO pending_requests (position, url) VALUES (0, 'first');
                INSERT INTO pending_requests (position, url) VALUES (1, NULL);
                INSERT INTO pending_requests (position, url) VALUES (2, X'00FF');
                INSERT INTO pending_requests (position, url) VALUES (3, '');
                INSERT INTO pending_requests (position, url) VALUES (4, 'second');
                ",
            )
            .unwrap();

        assert_eq!(db.load_queue().unwrap(), urls(&["first", "second"]));
    }

    #[test]
    fn preferences_upsert() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.save_preferences(&[("identity", "u1"), ("systemVersion", "1")])
            .unwrap();
        db.save_preferences(&[("identity", "u2")]).unwrap();

        let preferences = db.load_preferences().unwrap();
        assert_eq!(preferences.get("identity").map(String::as_str), Some("u2"));
        assert_eq!(
            preferences.get("systemVersion").map(String::as_str),
            Some("1")
        );
        assert_eq!(preferences.len(), 2);
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }
}
