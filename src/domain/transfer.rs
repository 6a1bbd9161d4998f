// src/domain/transfer.rs

use chrono::{DateTime, Utc};
use serde_json::Value as Json;

use super::status::Status;

/// A package of files moving from staging to production under an
/// approval chain (spec §3).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Transfer {
    pub id: i64,
    /// Human-readable, monotonic, e.g. "TRF-00001".
    pub reference: String,
    pub name: String,
    pub category: String,
    pub status: Status,
    pub priority: i32,
    pub artist_id: i64,
    pub staging_path: String,
    pub production_path: Option<String>,
    pub total_files: i64,
    pub total_size_bytes: i64,
    /// Opaque scan-result summary, e.g. `{clean, infected, error, skipped, verified, failed, missing}`.
    pub scan_result: Option<Json>,
    pub scan_passed: Option<bool>,
    pub transfer_verified: Option<bool>,
    pub transfer_method: Option<String>,
    pub rejection_reason: Option<String>,
    pub tags: Vec<String>,
    pub shotgrid_project_id: Option<String>,
    pub shotgrid_entity_id: Option<String>,
    pub shotgrid_entity_type: Option<String>,
    pub transfer_started_at: Option<DateTime<Utc>>,
    pub transfer_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    /// The ShotGrid project slug used to build the production path:
    /// lowercased, spaces replaced with underscores, or `"unlinked"` when
    /// no project is linked (spec §4.4).
    pub fn project_slug(&self, shotgrid_project_name: Option<&str>) -> String {
        match shotgrid_project_name {
            Some(name) if !name.trim().is_empty() => {
                name.trim().to_lowercase().replace(' ', "_")
            }
            _ => "unlinked".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub name: String,
    pub category: String,
    pub priority: i32,
    pub artist_id: i64,
    pub tags: Vec<String>,
    pub shotgrid_project_id: Option<String>,
    pub shotgrid_entity_id: Option<String>,
    pub shotgrid_entity_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> Transfer {
        Transfer {
            id: 1,
            reference: "TRF-00001".into(),
            name: "Scene_042".into(),
            category: "vfx_assets".into(),
            status: Status::Uploaded,
            priority: 0,
            artist_id: 1,
            staging_path: "/staging/TRF-00001".into(),
            production_path: None,
            total_files: 0,
            total_size_bytes: 0,
            scan_result: None,
            scan_passed: None,
            transfer_verified: None,
            transfer_method: None,
            rejection_reason: None,
            tags: vec![],
            shotgrid_project_id: None,
            shotgrid_entity_id: None,
            shotgrid_entity_type: None,
            transfer_started_at: None,
            transfer_completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn project_slug_unlinked_when_absent() {
        let t = blank();
        assert_eq!(t.project_slug(None), "unlinked");
    }

    #[test]
    fn project_slug_normalizes_spaces_and_case() {
        let t = blank();
        assert_eq!(t.project_slug(Some("Alpha Quadrant")), "alpha_quadrant");
    }
}
