// src/domain/history.rs

use chrono::{DateTime, Utc};
use serde_json::Value as Json;

/// An append-only audit log entry. Never mutated or deleted; readers
/// order by the monotonically increasing primary key `id`, not by
/// `created_at`, which may tie within the same transaction (spec §5).
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransferHistoryEntry {
    pub id: i64,
    pub transfer_id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub description: String,
    pub metadata: Json,
    pub created_at: DateTime<Utc>,
}
