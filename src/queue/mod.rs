// src/queue/mod.rs

//! The durable task queue (spec §4.7): a FIFO per queue name, persisted
//! in the same SQLite database as everything else, with at-least-once
//! delivery via a lease. Grounded on the teacher's `DaemonJob`
//! persistence shape (`daemon::jobs`) and its semaphore-gated
//! concurrency limiter (`server::jobs::JobManager`).

use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::db::Store;
use crate::error::Result;

/// The three queue names the state machine ever enqueues onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Scanning,
    Transfer,
    Notifications,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Scanning => "scanning",
            QueueName::Transfer => "transfer",
            QueueName::Notifications => "notifications",
        }
    }
}

/// A unit of follow-up work produced by a committed `StateMachine::apply`
/// call. `idempotency_key` follows the `{kind}:{transfer_id}:{stage}`
/// scheme from spec §4.7 and is enforced unique at the SQL layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueueMessage {
    ScanTransfer { transfer_id: i64 },
    PrepareTransfer { transfer_id: i64 },
    CopyTransfer { transfer_id: i64 },
    VerifyTransfer { transfer_id: i64 },
    ShotGridComplete { transfer_id: i64 },
    SendNotification { notification_id: i64 },
}

impl QueueMessage {
    pub fn queue(&self) -> QueueName {
        match self {
            QueueMessage::ScanTransfer { .. } => QueueName::Scanning,
            QueueMessage::PrepareTransfer { .. }
            | QueueMessage::CopyTransfer { .. }
            | QueueMessage::VerifyTransfer { .. } => QueueName::Transfer,
            QueueMessage::ShotGridComplete { .. } | QueueMessage::SendNotification { .. } => {
                QueueName::Notifications
            }
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueMessage::ScanTransfer { transfer_id } => format!("scan:{transfer_id}:scanning"),
            QueueMessage::PrepareTransfer { transfer_id } => {
                format!("prepare:{transfer_id}:scan_passed")
            }
            QueueMessage::CopyTransfer { transfer_id } => {
                format!("copy:{transfer_id}:transferring")
            }
            QueueMessage::VerifyTransfer { transfer_id } => {
                format!("verify:{transfer_id}:verifying")
            }
            QueueMessage::ShotGridComplete { transfer_id } => {
                format!("shotgrid:{transfer_id}:transferred")
            }
            QueueMessage::SendNotification { notification_id } => {
                format!("notify:{notification_id}:pending")
            }
        }
    }
}

/// One leased or queued row, as handed to a worker's poll loop.
#[derive(Debug, Clone)]
pub struct LeasedTask {
    pub id: i64,
    pub message: QueueMessage,
    pub attempts: i64,
}

fn row_to_task(row: &Row) -> rusqlite::Result<LeasedTask> {
    let payload: String = row.get(1)?;
    let message: QueueMessage = serde_json::from_str(&payload).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(LeasedTask {
        id: row.get(0)?,
        message,
        attempts: row.get(2)?,
    })
}

/// Durable FIFO task queue backed by the `task_queue` table.
pub struct TaskQueue {
    store: Arc<Store>,
}

impl TaskQueue {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Enqueue `message` within the caller's already-open transaction.
    /// A duplicate idempotency key while the existing row is still
    /// `queued` or `leased` is a no-op: that cycle's task is already in
    /// flight. A duplicate key whose existing row is `done` or `dead` is
    /// revived back to `queued` instead — a transfer that re-enters a
    /// retryable stage (an admin override back into `scanning`, an
    /// operator re-running `/scanning/:id/start`) produces the same key
    /// every cycle, and the prior cycle's completed row must not
    /// permanently swallow the new one.
    pub fn enqueue_in(conn: &Connection, message: &QueueMessage) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        conn.execute(
            "INSERT INTO task_queue (queue, idempotency_key, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(idempotency_key) DO UPDATE SET
                 payload = excluded.payload,
                 status = 'queued',
                 attempts = 0,
                 lease_until = NULL
             WHERE task_queue.status IN ('done', 'dead')",
            params![message.queue().as_str(), message.idempotency_key(), payload],
        )?;
        Ok(())
    }

    /// Enqueue a batch of messages outside of any transaction, each in
    /// its own `BEGIN IMMEDIATE`. Used by callers handing off the
    /// `Vec<QueueMessage>` returned from a committed `apply` — per spec
    /// §4.1 step 8, this always happens strictly after that commit.
    pub fn enqueue_all(&self, messages: &[QueueMessage]) -> Result<()> {
        for message in messages {
            self.store.with_txn(|txn| Self::enqueue_in(txn, message))?;
        }
        Ok(())
    }

    /// Lease the oldest queued row for `queue`, marking it `leased` with
    /// a `lease_until` in the future. Returns `None` if nothing is
    /// ready — either empty or every row's lease has not yet expired.
    pub fn lease_next(&self, queue: QueueName, lease_duration: Duration) -> Result<Option<LeasedTask>> {
        self.store.with_txn(|txn| {
            let candidate = txn
                .query_row(
                    "SELECT id, payload, attempts FROM task_queue
                     WHERE queue = ?1
                       AND (status = 'queued' OR (status = 'leased' AND lease_until < CURRENT_TIMESTAMP))
                     ORDER BY id ASC LIMIT 1",
                    [queue.as_str()],
                    row_to_task,
                )
                .optional()?;

            let Some(task) = candidate else {
                return Ok(None);
            };

            let lease_until = chrono::Utc::now() + chrono::Duration::from_std(lease_duration).unwrap_or_default();
            txn.execute(
                "UPDATE task_queue SET status = 'leased', attempts = attempts + 1, lease_until = ?1 WHERE id = ?2",
                params![lease_until.to_rfc3339(), task.id],
            )?;

            Ok(Some(LeasedTask { attempts: task.attempts + 1, ..task }))
        })
    }

    pub fn mark_done(&self, task_id: i64) -> Result<()> {
        self.store.with_txn(|txn| {
            txn.execute("UPDATE task_queue SET status = 'done' WHERE id = ?1", [task_id])?;
            Ok(())
        })
    }

    /// Give up on a task after repeated failure: moves it to `dead`
    /// rather than leaving it to be redelivered forever.
    pub fn mark_dead(&self, task_id: i64) -> Result<()> {
        warn!(task_id, "task moved to dead letter");
        self.store.with_txn(|txn| {
            txn.execute("UPDATE task_queue SET status = 'dead' WHERE id = ?1", [task_id])?;
            Ok(())
        })
    }

    /// Release a lease early without marking done, so the next poll
    /// picks it straight back up (used when `PreconditionFailed` means
    /// "already handled elsewhere" rather than "retry me").
    pub fn release(&self, task_id: i64) -> Result<()> {
        debug!(task_id, "releasing task lease");
        self.mark_done(task_id)
    }
}

/// Per-queue concurrency gate, mirroring the teacher's
/// `JobManager::concurrency_semaphore`: `scanning` and `transfer` run
/// one task at a time, `notifications` runs many.
pub struct QueueConcurrency {
    pub scanning: Semaphore,
    pub transfer: Semaphore,
    pub notifications: Semaphore,
}

impl QueueConcurrency {
    pub fn new(scanning: usize, transfer: usize, notifications: usize) -> Self {
        Self {
            scanning: Semaphore::new(scanning.max(1)),
            transfer: Semaphore::new(transfer.max(1)),
            notifications: Semaphore::new(notifications.max(1)),
        }
    }

    pub fn for_queue(&self, queue: QueueName) -> &Semaphore {
        match queue {
            QueueName::Scanning => &self.scanning,
            QueueName::Transfer => &self.transfer,
            QueueName::Notifications => &self.notifications,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<Store> {
        let dir = tempfile::tempdir().unwrap();
        Arc::new(Store::open(dir.path().join("db.sqlite")).unwrap())
    }

    #[test]
    fn enqueue_is_idempotent_on_duplicate_key() {
        let store = store();
        let queue = TaskQueue::new(store.clone());
        let message = QueueMessage::ScanTransfer { transfer_id: 1 };
        queue.enqueue_all(&[message.clone(), message]).unwrap();

        let conn = store.connection().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM task_queue", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn lease_next_returns_oldest_queued_row() {
        let store = store();
        let queue = TaskQueue::new(store.clone());
        queue
            .enqueue_all(&[
                QueueMessage::ScanTransfer { transfer_id: 1 },
                QueueMessage::ScanTransfer { transfer_id: 2 },
            ])
            .unwrap();

        let leased = queue
            .lease_next(QueueName::Scanning, Duration::from_secs(60))
            .unwrap()
            .unwrap();
        match leased.message {
            QueueMessage::ScanTransfer { transfer_id } => assert_eq!(transfer_id, 1),
            _ => panic!("wrong message"),
        }
        assert_eq!(leased.attempts, 1);

        let nothing_yet = queue
            .lease_next(QueueName::Scanning, Duration::from_secs(60))
            .unwrap();
        match nothing_yet {
            Some(t) => assert_ne!(
                match t.message { QueueMessage::ScanTransfer { transfer_id } => transfer_id, _ => -1 },
                1
            ),
            None => panic!("expected the second row"),
        }
    }

    #[test]
    fn enqueue_revives_a_done_row_with_the_same_key() {
        let store = store();
        let queue = TaskQueue::new(store.clone());
        let message = QueueMessage::ScanTransfer { transfer_id: 1 };
        queue.enqueue_all(&[message.clone()]).unwrap();
        let leased = queue.lease_next(QueueName::Scanning, Duration::from_secs(60)).unwrap().unwrap();
        queue.mark_done(leased.id).unwrap();

        // A later cycle (e.g. after an admin override back into scanning)
        // produces the identical idempotency key; it must not be lost.
        queue.enqueue_all(&[message]).unwrap();
        let revived = queue.lease_next(QueueName::Scanning, Duration::from_secs(60)).unwrap().unwrap();
        assert_eq!(revived.id, leased.id);
        assert_eq!(revived.attempts, 1);
    }

    #[test]
    fn mark_done_removes_row_from_future_leases() {
        let store = store();
        let queue = TaskQueue::new(store.clone());
        queue
            .enqueue_all(&[QueueMessage::ScanTransfer { transfer_id: 1 }])
            .unwrap();
        let leased = queue
            .lease_next(QueueName::Scanning, Duration::from_secs(60))
            .unwrap()
            .unwrap();
        queue.mark_done(leased.id).unwrap();

        let again = queue
            .lease_next(QueueName::Scanning, Duration::from_secs(60))
            .unwrap();
        assert!(again.is_none());
    }
}
