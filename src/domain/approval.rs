// src/domain/approval.rs

use chrono::{DateTime, Utc};

use super::role::RequiredRole;
use super::status::ApprovalStatus;

/// One row of the five-stage approval chain. Exactly one record exists
/// per `(transfer_id, required_role)` (spec §3).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Approval {
    pub id: i64,
    pub transfer_id: i64,
    pub required_role: RequiredRole,
    pub approver_id: Option<i64>,
    pub status: ApprovalStatus,
    pub comment: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Approval {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}
