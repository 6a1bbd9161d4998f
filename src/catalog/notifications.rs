// src/catalog/notifications.rs

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::domain::{NewNotification, Notification, NotificationType};
use crate::error::Result;

const COLUMNS: &str =
    "id, user_id, transfer_id, type, title, message, is_read, email_sent, created_at";

fn from_row(row: &Row) -> rusqlite::Result<Notification> {
    let notification_type: String = row.get(3)?;
    let notification_type = notification_type.parse::<NotificationType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;

    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        transfer_id: row.get(2)?,
        notification_type,
        title: row.get(4)?,
        message: row.get(5)?,
        is_read: row.get(6)?,
        email_sent: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn insert(conn: &Connection, new: &NewNotification) -> Result<i64> {
    conn.execute(
        "INSERT INTO notifications (user_id, transfer_id, type, title, message)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.user_id,
            new.transfer_id,
            new.notification_type.as_str(),
            &new.title,
            &new.message,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Notification>> {
    let sql = format!("SELECT {COLUMNS} FROM notifications WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], from_row).optional()?)
}

pub fn mark_email_sent(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("UPDATE notifications SET email_sent = 1 WHERE id = ?1", [id])?;
    Ok(())
}

pub fn mark_read(conn: &Connection, id: i64, user_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(())
}

pub fn list_for_user(conn: &Connection, user_id: i64, unread_only: bool) -> Result<Vec<Notification>> {
    let sql = if unread_only {
        format!("SELECT {COLUMNS} FROM notifications WHERE user_id = ?1 AND is_read = 0 ORDER BY id DESC")
    } else {
        format!("SELECT {COLUMNS} FROM notifications WHERE user_id = ?1 ORDER BY id DESC")
    };
    let mut stmt = conn.prepare(&sql)?;
    let notifications = stmt
        .query_map([user_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(notifications)
}
