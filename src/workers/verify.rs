// src/workers/verify.rs

//! VerifyWorker (spec §4.5): re-hashes every file at `production_path`
//! and compares against the checksum recorded at upload. The terminal
//! step of the happy path — success fans out notifications and queues
//! the ShotGrid completion callback via the state machine's own
//! queue-message table.

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use crate::catalog::{files, transfers};
use crate::db::Store;
use crate::error::{Error, Result};
use crate::filesystem::hash;
use crate::queue::TaskQueue;
use crate::state_machine::{self, Actor, Intent};

pub struct VerifyWorker {
    store: Arc<Store>,
    queue: TaskQueue,
}

impl VerifyWorker {
    pub fn new(store: Arc<Store>) -> Self {
        let queue = TaskQueue::new(store.clone());
        Self { store, queue }
    }

    pub async fn run(&self, transfer_id: i64) -> Result<()> {
        let conn = self.store.connection()?;
        let transfer = transfers::find_by_id(&conn, transfer_id)?
            .ok_or_else(|| Error::not_found(format!("transfer {transfer_id}")))?;
        let production_path = transfer
            .production_path
            .clone()
            .ok_or_else(|| Error::storage("verify entered without a production_path"))?;
        let transfer_files = files::list_for_transfer(&conn, transfer_id)?;
        drop(conn);

        let mut mismatched = Vec::new();

        for file in &transfer_files {
            let path = Path::new(&production_path).join(&file.filename);
            let matches = match hash::hash_file(&path).await {
                Ok(digest) => file.checksum_sha256.as_deref() == Some(digest.as_str()),
                Err(e) => {
                    warn!(error = %e, file_id = file.id, "verify re-hash failed");
                    false
                }
            };

            let conn = self.store.connection()?;
            files::set_checksum_verified(&conn, file.id, matches)?;
            if !matches {
                mismatched.push(file.filename.clone());
            }
        }

        let outcome = if mismatched.is_empty() {
            self.store.with_txn(|txn| state_machine::apply(txn, transfer_id, Intent::VerifyOk, Actor::Worker))?
        } else {
            let sample: Vec<String> = mismatched.into_iter().take(5).collect();
            self.store.with_txn(|txn| {
                state_machine::apply(
                    txn,
                    transfer_id,
                    Intent::VerifyMismatch { mismatched_files: sample },
                    Actor::Worker,
                )
            })?
        };
        self.queue.enqueue_all(&outcome.queue_messages)?;
        Ok(())
    }
}
