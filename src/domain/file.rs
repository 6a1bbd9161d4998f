// src/domain/file.rs

use chrono::{DateTime, Utc};

use super::status::VirusScanStatus;

#[derive(Debug, Clone, serde::Serialize)]
pub struct TransferFile {
    pub id: i64,
    pub transfer_id: i64,
    pub filename: String,
    pub original_path: String,
    pub size_bytes: i64,
    pub checksum_sha256: Option<String>,
    pub checksum_verified: Option<bool>,
    pub virus_scan_status: VirusScanStatus,
    pub virus_scan_detail: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub filename: String,
    pub original_path: String,
    pub size_bytes: i64,
    pub checksum_sha256: String,
}
