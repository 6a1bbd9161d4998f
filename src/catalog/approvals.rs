// src/catalog/approvals.rs

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::domain::{Approval, ApprovalStatus, RequiredRole};
use crate::error::Result;

const COLUMNS: &str =
    "id, transfer_id, required_role, approver_id, status, comment, decided_at, created_at";

fn from_row(row: &Row) -> rusqlite::Result<Approval> {
    let required_role: String = row.get(2)?;
    let required_role = required_role.parse::<RequiredRole>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;
    let status: String = row.get(4)?;
    let status = status.parse::<ApprovalStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;

    Ok(Approval {
        id: row.get(0)?,
        transfer_id: row.get(1)?,
        required_role,
        approver_id: row.get(3)?,
        status,
        comment: row.get(5)?,
        decided_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Create the five pending approval-stage rows for a newly uploaded
/// transfer (spec §4.2: the chain is seeded in full up front, stages are
/// decided or skipped one at a time as the transfer advances).
pub fn seed_chain(conn: &Connection, transfer_id: i64) -> Result<()> {
    for role in RequiredRole::ALL {
        conn.execute(
            "INSERT INTO approvals (transfer_id, required_role) VALUES (?1, ?2)",
            params![transfer_id, role.as_str()],
        )?;
    }
    Ok(())
}

pub fn list_for_transfer(conn: &Connection, transfer_id: i64) -> Result<Vec<Approval>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM approvals WHERE transfer_id = ?1 ORDER BY id"
    ))?;
    let approvals = stmt
        .query_map([transfer_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(approvals)
}

pub fn find_stage(
    conn: &Connection,
    transfer_id: i64,
    required_role: RequiredRole,
) -> Result<Option<Approval>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM approvals WHERE transfer_id = ?1 AND required_role = ?2"
    ))?;
    Ok(stmt
        .query_row(params![transfer_id, required_role.as_str()], from_row)
        .optional()?)
}

pub fn decide(
    conn: &Connection,
    transfer_id: i64,
    required_role: RequiredRole,
    approver_id: Option<i64>,
    status: ApprovalStatus,
    comment: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE approvals SET approver_id = ?1, status = ?2, comment = ?3, decided_at = CURRENT_TIMESTAMP
         WHERE transfer_id = ?4 AND required_role = ?5",
        params![approver_id, status.as_str(), comment, transfer_id, required_role.as_str()],
    )?;
    Ok(())
}

pub fn skip(conn: &Connection, transfer_id: i64, required_role: RequiredRole, actor_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE approvals SET approver_id = ?1, status = 'skipped', decided_at = CURRENT_TIMESTAMP
         WHERE transfer_id = ?2 AND required_role = ?3",
        params![actor_id, transfer_id, required_role.as_str()],
    )?;
    Ok(())
}

/// Pending approval stages across all transfers visible to the caller's
/// role, for the "what's on my plate" dashboard view (spec §6).
pub fn pending_for_role(conn: &Connection, required_role: RequiredRole) -> Result<Vec<Approval>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM approvals WHERE required_role = ?1 AND status = 'pending' ORDER BY id"
    ))?;
    let approvals = stmt
        .query_map([required_role.as_str()], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(approvals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;

    fn seeded_transfer(conn: &Connection) -> i64 {
        conn.execute(
            "INSERT INTO users (username, display_name, email, role, password_hash) VALUES ('a','A','a@x','artist','h')",
            [],
        ).unwrap();
        conn.execute(
            "INSERT INTO transfers (reference, name, category, status, artist_id, staging_path)
             VALUES ('TRF-00001','n','c','uploaded',1,'/s')",
            [],
        ).unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn seed_chain_creates_five_pending_stages() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db.sqlite")).unwrap();
        let conn = store.connection().unwrap();
        let transfer_id = seeded_transfer(&conn);

        seed_chain(&conn, transfer_id).unwrap();
        let chain = list_for_transfer(&conn, transfer_id).unwrap();
        assert_eq!(chain.len(), 5);
        assert!(chain.iter().all(|a| a.status == ApprovalStatus::Pending));
    }

    #[test]
    fn decide_updates_single_stage() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db.sqlite")).unwrap();
        let conn = store.connection().unwrap();
        let transfer_id = seeded_transfer(&conn);
        seed_chain(&conn, transfer_id).unwrap();

        decide(
            &conn,
            transfer_id,
            RequiredRole::TeamLead,
            Some(1),
            ApprovalStatus::Approved,
            Some("looks good"),
        )
        .unwrap();

        let stage = find_stage(&conn, transfer_id, RequiredRole::TeamLead)
            .unwrap()
            .unwrap();
        assert_eq!(stage.status, ApprovalStatus::Approved);
        assert_eq!(stage.approver_id, Some(1));

        let other = find_stage(&conn, transfer_id, RequiredRole::Supervisor)
            .unwrap()
            .unwrap();
        assert!(other.is_pending());
    }
}
