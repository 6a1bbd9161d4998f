// src/db/schema.rs

//! Database schema definitions and migrations.
//!
//! This module defines the SQLite schema for all core tables and provides
//! a migration system to evolve the schema over time.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let current_version = get_schema_version(conn)?;
    info!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        info!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!(
        "Schema migration complete. Now at version {}",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => panic!("Unknown migration version: {}", version),
    }
}

/// Initial schema - Version 1
///
/// Creates all core tables:
/// - users: operator accounts with a fixed role
/// - sessions: bearer tokens issued at login
/// - transfers: the package moving from staging to production
/// - transfer_files: per-file upload and checksum/scan records
/// - approvals: the five-stage approval chain, one row per stage
/// - transfer_history: append-only audit log
/// - notifications: per-user inbox entries, optionally mirrored by email
/// - task_queue: durable FIFO-per-class work queue for background workers
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN
                ('artist','team_lead','supervisor','line_producer','data_team','it_team','admin')),
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            expires_at TEXT NOT NULL
        );
        CREATE INDEX idx_sessions_user_id ON sessions(user_id);

        CREATE TABLE transfers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            status TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            artist_id INTEGER NOT NULL REFERENCES users(id),
            staging_path TEXT NOT NULL,
            production_path TEXT,
            total_files INTEGER NOT NULL DEFAULT 0,
            total_size_bytes INTEGER NOT NULL DEFAULT 0,
            scan_result TEXT,
            scan_passed INTEGER,
            transfer_verified INTEGER,
            transfer_method TEXT,
            rejection_reason TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            shotgrid_project_id TEXT,
            shotgrid_entity_id TEXT,
            shotgrid_entity_type TEXT,
            transfer_started_at TEXT,
            transfer_completed_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX idx_transfers_status ON transfers(status);
        CREATE INDEX idx_transfers_artist_id ON transfers(artist_id);

        CREATE TABLE transfer_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transfer_id INTEGER NOT NULL REFERENCES transfers(id) ON DELETE CASCADE,
            filename TEXT NOT NULL,
            original_path TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            checksum_sha256 TEXT,
            checksum_verified INTEGER,
            virus_scan_status TEXT NOT NULL DEFAULT 'pending'
                CHECK(virus_scan_status IN ('pending','clean','infected','error')),
            virus_scan_detail TEXT,
            uploaded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX idx_transfer_files_transfer_id ON transfer_files(transfer_id);

        CREATE TABLE approvals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transfer_id INTEGER NOT NULL REFERENCES transfers(id) ON DELETE CASCADE,
            required_role TEXT NOT NULL
                CHECK(required_role IN ('team_lead','supervisor','line_producer','data_team','it_team')),
            approver_id INTEGER REFERENCES users(id),
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK(status IN ('pending','approved','rejected','skipped')),
            comment TEXT,
            decided_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(transfer_id, required_role)
        );
        CREATE INDEX idx_approvals_transfer_id ON approvals(transfer_id);

        CREATE TABLE transfer_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transfer_id INTEGER NOT NULL REFERENCES transfers(id) ON DELETE CASCADE,
            user_id INTEGER REFERENCES users(id),
            action TEXT NOT NULL,
            description TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX idx_transfer_history_transfer_id ON transfer_history(transfer_id);

        CREATE TABLE notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            transfer_id INTEGER REFERENCES transfers(id) ON DELETE CASCADE,
            type TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            email_sent INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX idx_notifications_user_id ON notifications(user_id);

        CREATE TABLE task_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue TEXT NOT NULL CHECK(queue IN ('scanning','transfer','notifications')),
            idempotency_key TEXT NOT NULL UNIQUE,
            payload TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued'
                CHECK(status IN ('queued','leased','done','dead')),
            attempts INTEGER NOT NULL DEFAULT 0,
            lease_until TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX idx_task_queue_queue_status ON task_queue(queue, status, id);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_schema_version_tracking() {
        let (_temp, conn) = create_test_db();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 0);

        set_schema_version(&conn, 1).unwrap();
        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for expected in [
            "users",
            "sessions",
            "transfers",
            "transfer_files",
            "approvals",
            "transfer_history",
            "notifications",
            "task_queue",
            "schema_version",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table {expected}");
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();
        let version1 = get_schema_version(&conn).unwrap();

        migrate(&conn).unwrap();
        let version2 = get_schema_version(&conn).unwrap();

        assert_eq!(version1, version2);
        assert_eq!(version1, SCHEMA_VERSION);
    }

    #[test]
    fn test_approvals_unique_per_transfer_and_role() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO users (username, display_name, email, role, password_hash)
             VALUES ('artist1','Artist One','a@studio.example','artist','h')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO transfers (reference, name, category, status, artist_id, staging_path)
             VALUES ('TRF-00001','Scene_042','vfx_assets','uploaded',1,'/staging/TRF-00001')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO approvals (transfer_id, required_role) VALUES (1, 'team_lead')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO approvals (transfer_id, required_role) VALUES (1, 'team_lead')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_task_queue_idempotency_key_unique() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO task_queue (queue, idempotency_key, payload) VALUES ('scanning', 'k1', '{}')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO task_queue (queue, idempotency_key, payload) VALUES ('transfer', 'k1', '{}')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_foreign_key_constraints() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO transfers (reference, name, category, status, artist_id, staging_path)
             VALUES ('TRF-99999','n','c','uploaded',999,'/s')",
            [],
        );
        assert!(result.is_err());
    }
}
