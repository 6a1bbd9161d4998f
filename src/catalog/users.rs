// src/catalog/users.rs

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::domain::{NewUser, Role, User};
use crate::error::Result;

fn from_row(row: &Row) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        ))
    })?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        role,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const COLUMNS: &str =
    "id, username, display_name, email, role, is_active, created_at, updated_at";

/// Insert a new user with an already-hashed password. Returns the new row id.
pub fn insert(conn: &Connection, user: &NewUser, password_hash: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, display_name, email, role, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            &user.username,
            &user.display_name,
            &user.email,
            user.role.as_str(),
            password_hash,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM users WHERE id = ?1"))?;
    Ok(stmt.query_row([id], from_row).optional()?)
}

pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM users WHERE username = ?1"))?;
    Ok(stmt.query_row([username], from_row).optional()?)
}

/// The password hash alongside the identity, for login verification only.
pub fn find_credentials(conn: &Connection, username: &str) -> Result<Option<(User, String)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS}, password_hash FROM users WHERE username = ?1"
    ))?;
    let row = stmt
        .query_row([username], |row| {
            let user = from_row(row)?;
            let hash: String = row.get(8)?;
            Ok((user, hash))
        })
        .optional()?;
    Ok(row)
}

pub fn list_all(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM users ORDER BY username"))?;
    let users = stmt
        .query_map([], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn list_by_role(conn: &Connection, role: Role) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM users WHERE role = ?1 AND is_active = 1 ORDER BY username"
    ))?;
    let users = stmt
        .query_map([role.as_str()], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn set_active(conn: &Connection, id: i64, is_active: bool) -> Result<()> {
    conn.execute(
        "UPDATE users SET is_active = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![is_active, id],
    )?;
    Ok(())
}
