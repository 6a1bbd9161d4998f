// src/catalog/history.rs

use rusqlite::{Connection, Row, params};
use serde_json::Value as Json;

use crate::domain::TransferHistoryEntry;
use crate::error::Result;

const COLUMNS: &str = "id, transfer_id, user_id, action, description, metadata, created_at";

fn from_row(row: &Row) -> rusqlite::Result<TransferHistoryEntry> {
    let metadata: String = row.get(5)?;
    let metadata: Json = serde_json::from_str(&metadata).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(TransferHistoryEntry {
        id: row.get(0)?,
        transfer_id: row.get(1)?,
        user_id: row.get(2)?,
        action: row.get(3)?,
        description: row.get(4)?,
        metadata,
        created_at: row.get(6)?,
    })
}

pub fn append(
    conn: &Connection,
    transfer_id: i64,
    user_id: Option<i64>,
    action: &str,
    description: &str,
    metadata: &Json,
) -> Result<i64> {
    let metadata_json = serde_json::to_string(metadata)?;
    conn.execute(
        "INSERT INTO transfer_history (transfer_id, user_id, action, description, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![transfer_id, user_id, action, description, metadata_json],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Ordered by `id`, not `created_at` — several entries can share a
/// timestamp within one transaction and only the primary key guarantees
/// a stable order (spec §3).
pub fn list_for_transfer(conn: &Connection, transfer_id: i64) -> Result<Vec<TransferHistoryEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM transfer_history WHERE transfer_id = ?1 ORDER BY id"
    ))?;
    let entries = stmt
        .query_map([transfer_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use serde_json::json;

    #[test]
    fn append_and_list_preserve_insertion_order() {
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

        append(&conn, 1, Some(1), "uploaded", "transfer uploaded", &json!({})).unwrap();
        append(&conn, 1, None, "scan_started", "scan started", &json!({"queue": "scanning"})).unwrap();

        let entries = list_for_transfer(&conn, 1).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "uploaded");
        assert_eq!(entries[1].action, "scan_started");
        assert_eq!(entries[1].metadata["queue"], "scanning");
    }
}
