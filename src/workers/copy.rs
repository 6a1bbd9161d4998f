// src/workers/copy.rs

//! CopyWorker (spec §4.4): prepares the production directory on
//! `scan_passed`, then on an operator's `execute` call performs the
//! staging-to-production copy via `rsync` or a directory-walk stream
//! copy. Grounded on the teacher's subprocess-with-wall-clock-timeout
//! pattern, generalized to two interchangeable transfer methods.

use std::path::Path;
use std::sync::Arc;

use filetime::FileTime;
use tokio::process::Command;
use tracing::warn;
use walkdir::WalkDir;

use crate::catalog::transfers;
use crate::config::{CopyConfig, TransferMethod};
use crate::db::Store;
use crate::domain::Transfer;
use crate::error::{Error, Result};
use crate::queue::TaskQueue;
use crate::shotgrid::ShotGridClient;
use crate::state_machine::{self, Actor, Intent};

pub struct CopyWorker {
    store: Arc<Store>,
    queue: TaskQueue,
    config: CopyConfig,
    production_root: std::path::PathBuf,
    shotgrid: Arc<dyn ShotGridClient>,
}

impl CopyWorker {
    pub fn new(
        store: Arc<Store>,
        config: CopyConfig,
        production_root: std::path::PathBuf,
        shotgrid: Arc<dyn ShotGridClient>,
    ) -> Self {
        let queue = TaskQueue::new(store.clone());
        Self { store, queue, config, production_root, shotgrid }
    }

    /// Entered on `scan_passed`: compute and create the production
    /// directory, then transition to `ready_for_transfer`.
    pub async fn prepare(&self, transfer_id: i64) -> Result<()> {
        let conn = self.store.connection()?;
        let transfer = transfers::find_by_id(&conn, transfer_id)?
            .ok_or_else(|| Error::not_found(format!("transfer {transfer_id}")))?;
        drop(conn);

        let project_name = self.project_name(&transfer).await;
        let slug = transfer.project_slug(project_name.as_deref());
        let production_path = self
            .production_root
            .join(&slug)
            .join(&transfer.category)
            .join(&transfer.reference);

        tokio::fs::create_dir_all(&production_path)
            .await
            .map_err(|e| Error::worker_external(format!("creating production dir: {e}")))?;

        let path_str = production_path.to_string_lossy().to_string();
        let outcome = self.store.with_txn(|txn| {
            state_machine::apply(txn, transfer_id, Intent::Prepare { production_path: path_str }, Actor::Worker)
        })?;
        self.queue.enqueue_all(&outcome.queue_messages)?;
        Ok(())
    }

    async fn project_name(&self, transfer: &Transfer) -> Option<String> {
        let project_id = transfer.shotgrid_project_id.as_deref()?;
        self.shotgrid.find_project(project_id).await.map(|p| p.name)
    }

    /// Entered by an it_team/admin `execute` call (see `ApprovalCoordinator`-
    /// style callers in the server layer): transitions to `transferring`
    /// and enqueues the `CopyTransfer` message this method's sibling,
    /// `perform_copy`, later drains.
    pub fn execute(&self, transfer_id: i64, actor: Actor) -> Result<Transfer> {
        let method = match self.config.method {
            TransferMethod::Rsync => "rsync",
            TransferMethod::Copy => "copy",
        };
        let outcome = self.store.with_txn(|txn| {
            state_machine::apply(
                txn,
                transfer_id,
                Intent::Execute { transfer_method: method.to_string() },
                actor,
            )
        })?;
        self.queue.enqueue_all(&outcome.queue_messages)?;
        Ok(outcome.transfer)
    }

    /// Drains a `CopyTransfer` queue message: performs the actual
    /// staging-to-production copy and reports the outcome back to the
    /// state machine as `CopyDone` or `CopyError`.
    pub async fn perform_copy(&self, transfer_id: i64) -> Result<()> {
        let conn = self.store.connection()?;
        let transfer = transfers::find_by_id(&conn, transfer_id)?
            .ok_or_else(|| Error::not_found(format!("transfer {transfer_id}")))?;
        drop(conn);

        let src = transfer.staging_path.clone();
        let dst = transfer
            .production_path
            .clone()
            .ok_or_else(|| Error::storage("copy entered without a production_path"))?;

        let result = match self.config.method {
            TransferMethod::Rsync => self.copy_rsync(&src, &dst).await,
            TransferMethod::Copy => self.copy_stream(&src, &dst).await,
        };

        let outcome = match result {
            Ok(()) => self.store.with_txn(|txn| {
                state_machine::apply(txn, transfer_id, Intent::CopyDone, Actor::Worker)
            })?,
            Err(detail) => {
                warn!(transfer_id, %detail, "copy failed");
                self.store.with_txn(|txn| {
                    state_machine::apply(txn, transfer_id, Intent::CopyError { detail }, Actor::Worker)
                })?
            }
        };
        self.queue.enqueue_all(&outcome.queue_messages)?;
        Ok(())
    }

    async fn copy_rsync(&self, src: &str, dst: &str) -> std::result::Result<(), String> {
        let src_slash = format!("{}/", src.trim_end_matches('/'));
        let dst_slash = format!("{}/", dst.trim_end_matches('/'));

        let child = Command::new(&self.config.rsync_path)
            .arg("-avz")
            .arg("--checksum")
            .arg(&src_slash)
            .arg(&dst_slash)
            .output();

        match tokio::time::timeout(self.config.wall_clock_timeout(), child).await {
            Err(_) => Err(format!("rsync exceeded {:?}", self.config.wall_clock_timeout())),
            Ok(Err(e)) => Err(format!("failed to spawn rsync: {e}")),
            Ok(Ok(output)) if output.status.success() => Ok(()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let tail: String = stderr.lines().rev().take(20).collect::<Vec<_>>().into_iter().rev().collect::<Vec<_>>().join("\n");
                Err(format!("rsync exited {}: {tail}", output.status))
            }
        }
    }

    /// Directory-walk stream copy: reads each file in 1 MiB chunks and
    /// mirrors the source's mtime onto the copy. Integrity is checked
    /// independently afterward by `VerifyWorker`'s own full re-hash
    /// rather than here, so both this path and the `copy_file_range`
    /// fast path below can skip hashing during the copy itself.
    async fn copy_stream(&self, src: &str, dst: &str) -> std::result::Result<(), String> {
        let src_root = Path::new(src).to_path_buf();
        let dst_root = Path::new(dst).to_path_buf();

        let entries: Vec<_> = WalkDir::new(&src_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();

        for entry in entries {
            let rel = entry.path().strip_prefix(&src_root).map_err(|e| e.to_string())?;
            let dst_path = dst_root.join(rel);
            if let Some(parent) = dst_path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| e.to_string())?;
            }

            stream_copy_one(entry.path(), &dst_path).await.map_err(|e| e.to_string())?;

            let metadata = std::fs::metadata(entry.path()).map_err(|e| e.to_string())?;
            let mtime = FileTime::from_last_modification_time(&metadata);
            filetime::set_file_mtime(&dst_path, mtime).map_err(|e| e.to_string())?;
        }

        Ok(())
    }

    /// Reports transfer completion to ShotGrid per spec §6's write
    /// contract. Tolerant of failure: `ShotGridClient` methods already
    /// swallow their own errors, so this never rolls back transfer state.
    pub async fn shotgrid_complete(&self, transfer_id: i64) -> Result<()> {
        let conn = self.store.connection()?;
        let transfer = transfers::find_by_id(&conn, transfer_id)?
            .ok_or_else(|| Error::not_found(format!("transfer {transfer_id}")))?;
        drop(conn);

        let (Some(entity_type), Some(entity_id)) =
            (transfer.shotgrid_entity_type.as_deref(), transfer.shotgrid_entity_id.as_deref())
        else {
            return Ok(());
        };

        self.shotgrid.update_status(entity_type, entity_id, "dlvr").await;
        self.shotgrid
            .create_version(
                entity_id,
                crate::shotgrid::NewVersion {
                    code: transfer.reference.clone(),
                    description: format!("Delivered via conveyor: {}", transfer.name),
                    path: transfer.production_path.clone().unwrap_or_default(),
                },
            )
            .await;
        self.shotgrid
            .create_note(entity_id, "Delivery complete", &format!("{} has been delivered.", transfer.reference))
            .await;
        Ok(())
    }
}

const COPY_CHUNK_SIZE: usize = 1024 * 1024;

async fn stream_copy_one(src: &Path, dst: &Path) -> std::io::Result<()> {
    if copy_file_range_fast_path(src, dst).await? {
        return Ok(());
    }

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut source = tokio::fs::File::open(src).await?;
    let mut dest = tokio::fs::File::create(dst).await?;
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];

    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        dest.write_all(&buf[..n]).await?;
    }
    dest.flush().await?;
    Ok(())
}

/// Attempts an in-kernel `copy_file_range(2)` copy on Linux, which
/// avoids the read/write round trip through userspace. Returns `Ok(true)`
/// on success; `Ok(false)` means the caller should fall back to the
/// chunked stream copy (older kernel, cross-filesystem copy, non-Linux).
#[cfg(target_os = "linux")]
async fn copy_file_range_fast_path(src: &Path, dst: &Path) -> std::io::Result<bool> {
    use std::fs::OpenOptions;
    use std::os::unix::io::AsRawFd;

    let src = src.to_path_buf();
    let dst = dst.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let source = std::fs::File::open(&src)?;
        let dest = OpenOptions::new().write(true).create(true).truncate(true).open(&dst)?;
        let len = source.metadata()?.len();

        let mut remaining = len as i64;
        while remaining > 0 {
            let n = unsafe {
                libc::copy_file_range(
                    source.as_raw_fd(),
                    std::ptr::null_mut(),
                    dest.as_raw_fd(),
                    std::ptr::null_mut(),
                    remaining as usize,
                    0,
                )
            };
            if n < 0 {
                return Ok(false);
            }
            if n == 0 {
                break;
            }
            remaining -= n as i64;
        }
        Ok(true)
    })
    .await
    .unwrap_or(Ok(false))
}

#[cfg(not(target_os = "linux"))]
async fn copy_file_range_fast_path(_src: &Path, _dst: &Path) -> std::io::Result<bool> {
    Ok(false)
}
