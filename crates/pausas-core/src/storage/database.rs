//! SQLite storage.
//!
//! One database file holds:
//! - A key-value table for small per-user snapshots (timer state, recent
//!   exercises)
//! - Break sessions and the daily compliance records derived from them,
//!   both keyed by user

use std::path::Path;

use rusqlite::{params, Connection};

use super::data_dir;
use crate::error::{DatabaseError, Result};

/// SQLite connection with the schema applied.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/pausas-activas/pausas.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("pausas.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests, throwaway runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS break_sessions (
                id                        TEXT PRIMARY KEY,
                user_id                   TEXT NOT NULL,
                date                      TEXT NOT NULL,
                started_at                TEXT NOT NULL,
                completed_at              TEXT,
                completed                 INTEGER NOT NULL DEFAULT 0,
                exercise_ids              TEXT NOT NULL DEFAULT '[]',
                duration_planned_seconds  INTEGER NOT NULL,
                duration_actual_seconds   INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS daily_records (
                user_id             TEXT NOT NULL,
                date                TEXT NOT NULL,
                sessions_expected   INTEGER NOT NULL DEFAULT 4,
                sessions_started    INTEGER NOT NULL DEFAULT 0,
                sessions_completed  INTEGER NOT NULL DEFAULT 0,
                compliance_percent  INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_break_sessions_user_date
                ON break_sessions(user_id, date);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a key from the kv store. Missing keys are not an error.
    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "again").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "again");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_delete("test").unwrap();
    }

    #[test]
    fn open_at_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pausas.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("k", "v").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
    }
}
