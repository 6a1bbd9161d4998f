// src/catalog/files.rs

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::domain::{NewFile, TransferFile, VirusScanStatus};
use crate::error::Result;

const COLUMNS: &str = "id, transfer_id, filename, original_path, size_bytes, checksum_sha256,
    checksum_verified, virus_scan_status, virus_scan_detail, uploaded_at";

fn from_row(row: &Row) -> rusqlite::Result<TransferFile> {
    let virus_scan_status: String = row.get(7)?;
    let virus_scan_status = virus_scan_status.parse::<VirusScanStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;

    Ok(TransferFile {
        id: row.get(0)?,
        transfer_id: row.get(1)?,
        filename: row.get(2)?,
        original_path: row.get(3)?,
        size_bytes: row.get(4)?,
        checksum_sha256: row.get(5)?,
        checksum_verified: row.get(6)?,
        virus_scan_status,
        virus_scan_detail: row.get(8)?,
        uploaded_at: row.get(9)?,
    })
}

pub fn insert(conn: &Connection, transfer_id: i64, new: &NewFile) -> Result<i64> {
    conn.execute(
        "INSERT INTO transfer_files (transfer_id, filename, original_path, size_bytes, checksum_sha256)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            transfer_id,
            &new.filename,
            &new.original_path,
            new.size_bytes,
            &new.checksum_sha256,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<TransferFile>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM transfer_files WHERE id = ?1"))?;
    Ok(stmt.query_row([id], from_row).optional()?)
}

pub fn list_for_transfer(conn: &Connection, transfer_id: i64) -> Result<Vec<TransferFile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM transfer_files WHERE transfer_id = ?1 ORDER BY filename"
    ))?;
    let files = stmt
        .query_map([transfer_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(files)
}

pub fn set_scan_result(
    conn: &Connection,
    id: i64,
    status: VirusScanStatus,
    detail: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE transfer_files SET virus_scan_status = ?1, virus_scan_detail = ?2 WHERE id = ?3",
        params![status.as_str(), detail, id],
    )?;
    Ok(())
}

pub fn set_checksum_verified(conn: &Connection, id: i64, verified: bool) -> Result<()> {
    conn.execute(
        "UPDATE transfer_files SET checksum_verified = ?1 WHERE id = ?2",
        params![verified, id],
    )?;
    Ok(())
}

/// True once every file for the transfer has a terminal scan verdict
/// (clean, infected or error) — used by the scan worker to decide when
/// the transfer-level verdict can be computed.
pub fn all_scanned(conn: &Connection, transfer_id: i64) -> Result<bool> {
    let pending: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transfer_files WHERE transfer_id = ?1 AND virus_scan_status = 'pending'",
        [transfer_id],
        |row| row.get(0),
    )?;
    Ok(pending == 0)
}

pub fn any_infected(conn: &Connection, transfer_id: i64) -> Result<bool> {
    let infected: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transfer_files WHERE transfer_id = ?1 AND virus_scan_status = 'infected'",
        [transfer_id],
        |row| row.get(0),
    )?;
    Ok(infected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    #[test]
    fn all_scanned_reflects_pending_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db.sqlite")).unwrap();
        let conn = store.connection().unwrap();

        conn.execute(
            "INSERT INTO users (username, display_name, email, role, password_hash) VALUES ('a','A','a@x','artist','h')",
            [],
        ).unwrap();
        conn.execute(
            "INSERT INTO transfers (reference, name, category, status, artist_id, staging_path)
             VALUES ('TRF-00001','n','c','uploaded',1,'/s')",
            [],
        ).unwrap();

        let id = insert(
            &conn,
            1,
            &NewFile {
                filename: "a.exr".into(),
                original_path: "a.exr".into(),
                size_bytes: 100,
                checksum_sha256: "abc".into(),
            },
        )
        .unwrap();

        assert!(!all_scanned(&conn, 1).unwrap());
        set_scan_result(&conn, id, VirusScanStatus::Clean, None).unwrap();
        assert!(all_scanned(&conn, 1).unwrap());
        assert!(!any_infected(&conn, 1).unwrap());
    }
}
