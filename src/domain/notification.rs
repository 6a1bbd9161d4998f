// src/domain/notification.rs

use chrono::{DateTime, Utc};

use super::status::NotificationType;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub transfer_id: Option<i64>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub email_sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub transfer_id: Option<i64>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
}
