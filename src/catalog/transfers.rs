// src/catalog/transfers.rs

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value as Json;

use crate::domain::{NewTransfer, Status, Transfer};
use crate::error::Result;

const COLUMNS: &str = "id, reference, name, category, status, priority, artist_id, staging_path,
    production_path, total_files, total_size_bytes, scan_result, scan_passed, transfer_verified,
    transfer_method, rejection_reason, tags, shotgrid_project_id, shotgrid_entity_id,
    shotgrid_entity_type, transfer_started_at, transfer_completed_at, created_at, updated_at";

fn from_row(row: &Row) -> rusqlite::Result<Transfer> {
    let status: String = row.get(4)?;
    let status = status.parse::<Status>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;

    let scan_result: Option<String> = row.get(11)?;
    let scan_result = scan_result
        .map(|s| serde_json::from_str::<Json>(&s))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                11,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

    let tags: String = row.get(16)?;
    let tags: Vec<String> = serde_json::from_str(&tags).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(16, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Transfer {
        id: row.get(0)?,
        reference: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        status,
        priority: row.get(5)?,
        artist_id: row.get(6)?,
        staging_path: row.get(7)?,
        production_path: row.get(8)?,
        total_files: row.get(9)?,
        total_size_bytes: row.get(10)?,
        scan_result,
        scan_passed: row.get(12)?,
        transfer_verified: row.get(13)?,
        transfer_method: row.get(14)?,
        rejection_reason: row.get(15)?,
        tags,
        shotgrid_project_id: row.get(17)?,
        shotgrid_entity_id: row.get(18)?,
        shotgrid_entity_type: row.get(19)?,
        transfer_started_at: row.get(20)?,
        transfer_completed_at: row.get(21)?,
        created_at: row.get(22)?,
        updated_at: row.get(23)?,
    })
}

/// Allocate the next reference, e.g. `TRF-00042`, from the row count.
/// Callers must hold the enclosing `BEGIN IMMEDIATE` transaction so this
/// read and the following insert are atomic.
pub fn next_reference(conn: &Connection) -> Result<String> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transfers", [], |row| row.get(0))?;
    Ok(format!("TRF-{:05}", count + 1))
}

pub fn insert(conn: &Connection, reference: &str, staging_path: &str, new: &NewTransfer) -> Result<i64> {
    let tags = serde_json::to_string(&new.tags)?;
    conn.execute(
        "INSERT INTO transfers (reference, name, category, status, priority, artist_id,
            staging_path, tags, shotgrid_project_id, shotgrid_entity_id, shotgrid_entity_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            reference,
            &new.name,
            &new.category,
            Status::Uploaded.as_str(),
            new.priority,
            new.artist_id,
            staging_path,
            tags,
            &new.shotgrid_project_id,
            &new.shotgrid_entity_id,
            &new.shotgrid_entity_type,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Transfer>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM transfers WHERE id = ?1"))?;
    Ok(stmt.query_row([id], from_row).optional()?)
}

pub fn find_by_reference(conn: &Connection, reference: &str) -> Result<Option<Transfer>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM transfers WHERE reference = ?1"))?;
    Ok(stmt.query_row([reference], from_row).optional()?)
}

/// Re-read a row for update inside a transaction; same query as
/// `find_by_id`, named separately so call sites document intent.
pub fn find_for_update(conn: &Connection, id: i64) -> Result<Option<Transfer>> {
    find_by_id(conn, id)
}

pub fn list_for_statuses(conn: &Connection, statuses: &[Status]) -> Result<Vec<Transfer>> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = statuses.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("SELECT {COLUMNS} FROM transfers WHERE status IN ({placeholders}) ORDER BY priority DESC, id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
    let transfers = stmt
        .query_map(rusqlite::params_from_iter(params), from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(transfers)
}

pub fn list_by_artist(conn: &Connection, artist_id: i64) -> Result<Vec<Transfer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM transfers WHERE artist_id = ?1 ORDER BY id DESC"
    ))?;
    let transfers = stmt
        .query_map([artist_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(transfers)
}

pub fn list_all(conn: &Connection) -> Result<Vec<Transfer>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM transfers ORDER BY id DESC"))?;
    let transfers = stmt
        .query_map([], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(transfers)
}

pub fn set_status(conn: &Connection, id: i64, status: Status) -> Result<()> {
    conn.execute(
        "UPDATE transfers SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(())
}

pub fn set_production_path(conn: &Connection, id: i64, production_path: Option<&str>) -> Result<()> {
    conn.execute(
        "UPDATE transfers SET production_path = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![production_path, id],
    )?;
    Ok(())
}

pub fn set_rejection_reason(conn: &Connection, id: i64, reason: &str) -> Result<()> {
    conn.execute(
        "UPDATE transfers SET rejection_reason = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![reason, id],
    )?;
    Ok(())
}

pub fn set_scan_result(conn: &Connection, id: i64, scan_result: &Json, scan_passed: bool) -> Result<()> {
    let json = serde_json::to_string(scan_result)?;
    conn.execute(
        "UPDATE transfers SET scan_result = ?1, scan_passed = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?3",
        params![json, scan_passed, id],
    )?;
    Ok(())
}

pub fn set_transfer_method(conn: &Connection, id: i64, method: &str) -> Result<()> {
    conn.execute(
        "UPDATE transfers SET transfer_method = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![method, id],
    )?;
    Ok(())
}

pub fn set_transfer_started(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE transfers SET transfer_started_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        [id],
    )?;
    Ok(())
}

pub fn set_transfer_completed(conn: &Connection, id: i64, verified: bool) -> Result<()> {
    conn.execute(
        "UPDATE transfers SET transfer_completed_at = CURRENT_TIMESTAMP, transfer_verified = ?1,
            updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![verified, id],
    )?;
    Ok(())
}

pub fn increment_counts(conn: &Connection, id: i64, files_delta: i64, size_delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE transfers SET total_files = total_files + ?1, total_size_bytes = total_size_bytes + ?2,
            updated_at = CURRENT_TIMESTAMP WHERE id = ?3",
        params![files_delta, size_delta, id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::users;
    use crate::db::Store;
    use crate::domain::{NewUser, Role};

    fn store_with_artist() -> (Store, i64) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db.sqlite")).unwrap();
        let conn = store.connection().unwrap();
        let artist_id = users::insert(
            &conn,
            &NewUser {
                username: "jdoe".into(),
                display_name: "Jane Doe".into(),
                email: "jdoe@studio.example".into(),
                role: Role::Artist,
            },
            "h",
        )
        .unwrap();
        (store, artist_id)
    }

    #[test]
    fn insert_and_find_round_trip() {
        let (store, artist_id) = store_with_artist();
        let conn = store.connection().unwrap();

        let reference = next_reference(&conn).unwrap();
        assert_eq!(reference, "TRF-00001");

        let new = NewTransfer {
            name: "Scene_042".into(),
            category: "vfx_assets".into(),
            priority: 0,
            artist_id,
            tags: vec!["urgent".into()],
            shotgrid_project_id: None,
            shotgrid_entity_id: None,
            shotgrid_entity_type: None,
        };
        let id = insert(&conn, &reference, "/staging/TRF-00001", &new).unwrap();

        let found = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.reference, "TRF-00001");
        assert_eq!(found.status, Status::Uploaded);
        assert_eq!(found.tags, vec!["urgent".to_string()]);
    }

    #[test]
    fn list_for_statuses_filters_and_orders_by_priority() {
        let (store, artist_id) = store_with_artist();
        let conn = store.connection().unwrap();

        for (name, priority) in [("low", 0), ("high", 10)] {
            let reference = next_reference(&conn).unwrap();
            let new = NewTransfer {
                name: name.into(),
                category: "c".into(),
                priority,
                artist_id,
                tags: vec![],
                shotgrid_project_id: None,
                shotgrid_entity_id: None,
                shotgrid_entity_type: None,
            };
            insert(&conn, &reference, "/s", &new).unwrap();
        }

        let found = list_for_statuses(&conn, &[Status::Uploaded]).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "high");
    }

    #[test]
    fn set_status_updates_row() {
        let (store, artist_id) = store_with_artist();
        let conn = store.connection().unwrap();
        let reference = next_reference(&conn).unwrap();
        let new = NewTransfer {
            name: "n".into(),
            category: "c".into(),
            priority: 0,
            artist_id,
            tags: vec![],
            shotgrid_project_id: None,
            shotgrid_entity_id: None,
            shotgrid_entity_type: None,
        };
        let id = insert(&conn, &reference, "/s", &new).unwrap();
        set_status(&conn, id, Status::PendingTeamLead).unwrap();
        let found = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.status, Status::PendingTeamLead);
    }
}
