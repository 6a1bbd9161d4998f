// src/domain/status.rs

//! Closed enums for every status column in the data model (spec §3/§4.1).

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Uploaded,
    PendingTeamLead,
    PendingSupervisor,
    PendingLineProducer,
    Approved,
    Scanning,
    ScanPassed,
    ScanFailed,
    ReadyForTransfer,
    Transferring,
    Verifying,
    Transferred,
    Rejected,
    Cancelled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Uploaded => "uploaded",
            Status::PendingTeamLead => "pending_team_lead",
            Status::PendingSupervisor => "pending_supervisor",
            Status::PendingLineProducer => "pending_line_producer",
            Status::Approved => "approved",
            Status::Scanning => "scanning",
            Status::ScanPassed => "scan_passed",
            Status::ScanFailed => "scan_failed",
            Status::ReadyForTransfer => "ready_for_transfer",
            Status::Transferring => "transferring",
            Status::Verifying => "verifying",
            Status::Transferred => "transferred",
            Status::Rejected => "rejected",
            Status::Cancelled => "cancelled",
        }
    }

    /// Terminal states: no outgoing transition except admin override.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Transferred | Status::Rejected | Status::Cancelled | Status::ScanFailed
        )
    }

    /// `production_path` is non-null iff the status is one of these (spec §3 invariant).
    pub fn has_production_path(&self) -> bool {
        matches!(
            self,
            Status::ReadyForTransfer
                | Status::Transferring
                | Status::Verifying
                | Status::Transferred
                | Status::ScanFailed
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Status::Uploaded),
            "pending_team_lead" => Ok(Status::PendingTeamLead),
            "pending_supervisor" => Ok(Status::PendingSupervisor),
            "pending_line_producer" => Ok(Status::PendingLineProducer),
            "approved" => Ok(Status::Approved),
            "scanning" => Ok(Status::Scanning),
            "scan_passed" => Ok(Status::ScanPassed),
            "scan_failed" => Ok(Status::ScanFailed),
            "ready_for_transfer" => Ok(Status::ReadyForTransfer),
            "transferring" => Ok(Status::Transferring),
            "verifying" => Ok(Status::Verifying),
            "transferred" => Ok(Status::Transferred),
            "rejected" => Ok(Status::Rejected),
            "cancelled" => Ok(Status::Cancelled),
            other => Err(format!("invalid transfer status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Skipped,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            "skipped" => Ok(ApprovalStatus::Skipped),
            other => Err(format!("invalid approval status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirusScanStatus {
    Pending,
    Clean,
    Infected,
    Error,
}

impl VirusScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VirusScanStatus::Pending => "pending",
            VirusScanStatus::Clean => "clean",
            VirusScanStatus::Infected => "infected",
            VirusScanStatus::Error => "error",
        }
    }
}

impl fmt::Display for VirusScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VirusScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VirusScanStatus::Pending),
            "clean" => Ok(VirusScanStatus::Clean),
            "infected" => Ok(VirusScanStatus::Infected),
            "error" => Ok(VirusScanStatus::Error),
            other => Err(format!("invalid virus scan status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Upload,
    ApprovalRequired,
    Approved,
    Rejected,
    ScanStarted,
    ScanComplete,
    ScanFailed,
    TransferStarted,
    TransferComplete,
    TransferFailed,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Upload => "upload",
            NotificationType::ApprovalRequired => "approval_required",
            NotificationType::Approved => "approved",
            NotificationType::Rejected => "rejected",
            NotificationType::ScanStarted => "scan_started",
            NotificationType::ScanComplete => "scan_complete",
            NotificationType::ScanFailed => "scan_failed",
            NotificationType::TransferStarted => "transfer_started",
            NotificationType::TransferComplete => "transfer_complete",
            NotificationType::TransferFailed => "transfer_failed",
            NotificationType::System => "system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(NotificationType::Upload),
            "approval_required" => Ok(NotificationType::ApprovalRequired),
            "approved" => Ok(NotificationType::Approved),
            "rejected" => Ok(NotificationType::Rejected),
            "scan_started" => Ok(NotificationType::ScanStarted),
            "scan_complete" => Ok(NotificationType::ScanComplete),
            "scan_failed" => Ok(NotificationType::ScanFailed),
            "transfer_started" => Ok(NotificationType::TransferStarted),
            "transfer_complete" => Ok(NotificationType::TransferComplete),
            "transfer_failed" => Ok(NotificationType::TransferFailed),
            "system" => Ok(NotificationType::System),
            other => Err(format!("invalid notification type: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_path_invariant_matches_spec() {
        for status in [
            Status::ReadyForTransfer,
            Status::Transferring,
            Status::Verifying,
            Status::Transferred,
            Status::ScanFailed,
        ] {
            assert!(status.has_production_path());
        }
        for status in [
            Status::Uploaded,
            Status::PendingTeamLead,
            Status::Approved,
            Status::Scanning,
            Status::ScanPassed,
            Status::Rejected,
            Status::Cancelled,
        ] {
            assert!(!status.has_production_path());
        }
    }

    #[test]
    fn terminal_states() {
        assert!(Status::Transferred.is_terminal());
        assert!(Status::Rejected.is_terminal());
        assert!(Status::Cancelled.is_terminal());
        assert!(Status::ScanFailed.is_terminal());
        assert!(!Status::Uploaded.is_terminal());
        assert!(!Status::Scanning.is_terminal());
    }
}
