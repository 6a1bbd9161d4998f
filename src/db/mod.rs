// src/db/mod.rs

//! The storage layer: a thin wrapper over a single SQLite file, opened
//! fresh per operation the way the teacher's `DaemonState::open_db` does,
//! plus the `with_txn` helper that gives every mutating access the
//! serialized-transaction semantics the state machine and task queue
//! depend on.

pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use crate::error::{Error, Result};

/// Owns the path to the database file and hands out connections.
///
/// SQLite serializes writers at the file level; `with_txn` opens each
/// transaction with `BEGIN IMMEDIATE`, which acquires the write lock up
/// front instead of on first write, so two overlapping transactions fail
/// fast with `SQLITE_BUSY` rather than deadlocking. `busy_timeout` gives
/// a losing transaction a bounded wait before that surfaces as an error.
#[derive(Debug, Clone)]
pub struct Store {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl Store {
    /// Open (creating if necessary) the database at `db_path` and run
    /// any pending schema migrations.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::storage)?;
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        schema::migrate(&conn)?;

        info!(path = %db_path.display(), "database ready");

        Ok(Self {
            db_path,
            busy_timeout: Duration::from_secs(5),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Open a fresh connection. Callers on the async side must do this
    /// from inside `spawn_blocking` — rusqlite is synchronous.
    pub fn connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| Error::storage(format!("failed to set busy timeout: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction, committing on
    /// success and rolling back on error. Every mutating access to the
    /// catalog goes through this.
    pub fn with_txn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.connection()?;
        let txn = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&txn)?;
        txn.commit()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_parent_dirs_and_migrates() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("conveyor.db");
        let store = Store::open(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = store.connection().unwrap();
        let version = schema::get_schema_version(&conn).unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn with_txn_commits_on_ok() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("conveyor.db")).unwrap();

        store
            .with_txn(|txn| {
                txn.execute(
                    "INSERT INTO users (username, display_name, email, role, password_hash)
                     VALUES ('a', 'A', 'a@x', 'artist', 'h')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let conn = store.connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn with_txn_rolls_back_on_err() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("conveyor.db")).unwrap();

        let result: Result<()> = store.with_txn(|txn| {
            txn.execute(
                "INSERT INTO users (username, display_name, email, role, password_hash)
                 VALUES ('a', 'A', 'a@x', 'artist', 'h')",
                [],
            )?;
            Err(Error::precondition("force rollback"))
        });
        assert!(result.is_err());

        let conn = store.connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
