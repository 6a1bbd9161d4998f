// src/workers/watchdog.rs

//! Stale-transfer watchdog (SPEC_FULL §4.14): periodically flags
//! transfers that have sat in a worker-driven stage past a configured
//! threshold without a worker advancing them — the same failure mode
//! `TaskQueue::enqueue_in`'s done/dead revival guards against at the
//! re-enqueue boundary, but only if something actually re-enqueues.
//! This sweep catches the case where nothing ever does.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::catalog::{notifications, transfers, users};
use crate::db::Store;
use crate::domain::{NewNotification, NotificationType, Role, Status};
use crate::error::Result;

const STALE_STAGES: [Status; 3] = [Status::Scanning, Status::Transferring, Status::Verifying];

pub struct StaleTransferWatchdog {
    store: Arc<Store>,
    stale_after: chrono::Duration,
}

impl StaleTransferWatchdog {
    pub fn new(store: Arc<Store>, stale_after_hours: i64) -> Self {
        Self { store, stale_after: chrono::Duration::hours(stale_after_hours) }
    }

    /// One sweep: notify every admin about each transfer that has sat
    /// in `scanning`/`transferring`/`verifying` past the threshold.
    /// Re-notifies every sweep rather than tracking "already alerted"
    /// state — silencing a repeated alert is a notification-delivery
    /// concern, not this watchdog's.
    pub async fn sweep(&self) -> Result<()> {
        let conn = self.store.connection()?;
        let stale: Vec<_> = transfers::list_for_statuses(&conn, &STALE_STAGES)?
            .into_iter()
            .filter(|t| Utc::now() - t.updated_at > self.stale_after)
            .collect();

        if stale.is_empty() {
            return Ok(());
        }

        let admins: Vec<_> = users::list_all(&conn)?.into_iter().filter(|u| u.role == Role::Admin).collect();
        for transfer in &stale {
            warn!(transfer_id = transfer.id, status = %transfer.status, "transfer stale past watchdog threshold");
            for admin in &admins {
                notifications::insert(
                    &conn,
                    &NewNotification {
                        user_id: admin.id,
                        transfer_id: Some(transfer.id),
                        notification_type: NotificationType::System,
                        title: format!("Transfer {} stuck in {}", transfer.reference, transfer.status),
                        message: format!(
                            "Transfer {} has been in {} for longer than the configured threshold ({}h) and no worker has advanced it.",
                            transfer.reference,
                            transfer.status,
                            self.stale_after.num_hours()
                        ),
                    },
                )?;
            }
        }
        Ok(())
    }
}
