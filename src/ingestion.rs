// src/ingestion.rs

//! File ingestion (spec §4.8): not itself part of the state machine, but
//! bound by its invariants. Each uploaded file is streamed to
//! `staging_path/sanitized_filename` with the checksum computed in the
//! same pass, and the transfer's file count/size totals are incremented
//! atomically alongside the row insert.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::catalog::{files, transfers};
use crate::db::Store;
use crate::domain::{NewFile, Status, Transfer, TransferFile};
use crate::error::{Error, Result};
use crate::filesystem::hash::ChunkedHasher;
use crate::filesystem::path::{safe_join, sanitize_filename};
use crate::state_machine::Actor;

const UPLOAD_CHUNK_SIZE: usize = 1024 * 1024;

pub struct FileIngestor {
    store: Arc<Store>,
    max_upload_size_bytes: u64,
}

impl FileIngestor {
    pub fn new(store: Arc<Store>, max_upload_size_bytes: u64) -> Self {
        Self { store, max_upload_size_bytes }
    }

    /// Stream `reader` to staging, hashing as it writes, and record the
    /// resulting `TransferFile`. `original_filename` is the name as
    /// submitted by the client; it is sanitized before touching the
    /// filesystem and de-duplicated with a `_N` suffix on collision.
    pub async fn ingest(
        &self,
        transfer_id: i64,
        actor: Actor,
        original_filename: &str,
        mut reader: impl AsyncRead + Unpin,
    ) -> Result<TransferFile> {
        let conn = self.store.connection()?;
        let transfer = transfers::find_by_id(&conn, transfer_id)?
            .ok_or_else(|| Error::not_found(format!("transfer {transfer_id}")))?;
        check_upload_preconditions(&transfer, actor)?;
        drop(conn);

        tokio::fs::create_dir_all(&transfer.staging_path)
            .await
            .map_err(|e| Error::worker_external(format!("creating staging dir: {e}")))?;

        let sanitized = sanitize_filename(original_filename)?;
        let unique_name = self.unique_filename(&transfer.staging_path, &sanitized)?;
        let dest_path = safe_join(&transfer.staging_path, &unique_name)?;

        let stream_result = self
            .stream_to_disk(&mut reader, &dest_path, transfer.total_size_bytes.max(0) as u64)
            .await;

        let (size_bytes, checksum) = match stream_result {
            Ok(pair) => pair,
            Err(e) => {
                let _ = tokio::fs::remove_file(&dest_path).await;
                return Err(e);
            }
        };

        let conn = self.store.connection()?;
        let file_id = files::insert(
            &conn,
            transfer_id,
            &NewFile {
                filename: unique_name,
                original_path: original_filename.to_string(),
                size_bytes: size_bytes as i64,
                checksum_sha256: checksum,
            },
        )?;
        transfers::increment_counts(&conn, transfer_id, 1, size_bytes as i64)?;

        files::find_by_id(&conn, file_id)?
            .ok_or_else(|| Error::storage("uploaded file vanished immediately after insert"))
    }

    /// Appends `_1`, `_2`, ... to the stem until the candidate name is
    /// free in the staging directory.
    fn unique_filename(&self, staging_path: &str, filename: &str) -> Result<String> {
        let root = Path::new(staging_path);
        let path = Path::new(filename);
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let ext = path.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();

        let mut candidate = filename.to_string();
        let mut n = 1u32;
        while root.join(&candidate).exists() {
            candidate = format!("{stem}_{n}{ext}");
            n += 1;
        }
        Ok(candidate)
    }

    async fn stream_to_disk(
        &self,
        reader: &mut (impl AsyncRead + Unpin),
        dest: &Path,
        already_used_bytes: u64,
    ) -> Result<(u64, String)> {
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::worker_external(format!("creating staged file: {e}")))?;
        let mut hasher = ChunkedHasher::new();
        let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            written += n as u64;
            if already_used_bytes + written > self.max_upload_size_bytes {
                return Err(Error::precondition("cumulative upload size exceeds the configured limit"));
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
        }
        file.flush().await?;

        Ok((written, hasher.finish()))
    }
}

/// Uploads are refused unless transfer status ∈ {uploaded, rejected} and
/// only by the owning artist or an admin (spec §4.8).
fn check_upload_preconditions(transfer: &Transfer, actor: Actor) -> Result<()> {
    if !matches!(transfer.status, Status::Uploaded | Status::Rejected) {
        return Err(Error::precondition(format!(
            "cannot upload files while transfer is {}", transfer.status
        )));
    }

    let is_owner = actor.id() == Some(transfer.artist_id);
    let is_admin = actor.role().map(|r| r.is_admin()).unwrap_or(false);
    if !is_owner && !is_admin {
        return Err(Error::authz("only the owning artist or an admin may upload files"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{transfers as transfer_catalog, users};
    use crate::domain::{NewTransfer, NewUser, Role};
    use std::io::Cursor;

    fn setup() -> (Arc<Store>, i64, i64) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("db.sqlite")).unwrap());
        let conn = store.connection().unwrap();
        let artist_id = users::insert(
            &conn,
            &NewUser { username: "sarah".into(), display_name: "Sarah".into(), email: "s@x".into(), role: Role::Artist },
            "h",
        ).unwrap();
        let staging = dir.path().join("staging").join("TRF-00001");
        let reference = transfer_catalog::next_reference(&conn).unwrap();
        let transfer_id = transfer_catalog::insert(
            &conn, &reference, staging.to_str().unwrap(),
            &NewTransfer {
                name: "Scene_042".into(), category: "vfx_assets".into(), priority: 0, artist_id,
                tags: vec![], shotgrid_project_id: None, shotgrid_entity_id: None, shotgrid_entity_type: None,
            },
        ).unwrap();
        (store, artist_id, transfer_id)
    }

    #[tokio::test]
    async fn ingest_streams_file_and_updates_totals() {
        let (store, artist_id, transfer_id) = setup();
        let ingestor = FileIngestor::new(store.clone(), 1024 * 1024 * 1024);

        let cursor = Cursor::new(b"frame data".to_vec());
        let file = ingestor
            .ingest(transfer_id, Actor::User { id: artist_id, role: Role::Artist }, "shot_010.exr", cursor)
            .await
            .unwrap();

        assert_eq!(file.filename, "shot_010.exr");
        assert_eq!(file.size_bytes, 10);

        let conn = store.connection().unwrap();
        let transfer = transfer_catalog::find_by_id(&conn, transfer_id).unwrap().unwrap();
        assert_eq!(transfer.total_files, 1);
        assert_eq!(transfer.total_size_bytes, 10);
    }

    #[tokio::test]
    async fn ingest_deduplicates_colliding_filenames() {
        let (store, artist_id, transfer_id) = setup();
        let ingestor = FileIngestor::new(store.clone(), 1024 * 1024 * 1024);
        let actor = Actor::User { id: artist_id, role: Role::Artist };

        ingestor.ingest(transfer_id, actor, "shot.exr", Cursor::new(b"one".to_vec())).await.unwrap();
        let second = ingestor.ingest(transfer_id, actor, "shot.exr", Cursor::new(b"two".to_vec())).await.unwrap();

        assert_eq!(second.filename, "shot_1.exr");
    }

    #[tokio::test]
    async fn ingest_rejects_upload_on_non_uploadable_status() {
        let (store, artist_id, transfer_id) = setup();
        {
            let conn = store.connection().unwrap();
            transfer_catalog::set_status(&conn, transfer_id, Status::Scanning).unwrap();
        }
        let ingestor = FileIngestor::new(store.clone(), 1024 * 1024 * 1024);
        let err = ingestor
            .ingest(transfer_id, Actor::User { id: artist_id, role: Role::Artist }, "a.exr", Cursor::new(b"x".to_vec()))
            .await;
        assert!(matches!(err, Err(Error::Precondition(_))));
    }

    #[tokio::test]
    async fn ingest_rejects_non_owner_non_admin() {
        let (store, _artist_id, transfer_id) = setup();
        let ingestor = FileIngestor::new(store.clone(), 1024 * 1024 * 1024);
        let err = ingestor
            .ingest(transfer_id, Actor::User { id: 999, role: Role::TeamLead }, "a.exr", Cursor::new(b"x".to_vec()))
            .await;
        assert!(matches!(err, Err(Error::AuthZ(_))));
    }

    #[tokio::test]
    async fn ingest_enforces_cumulative_size_cap() {
        let (store, artist_id, transfer_id) = setup();
        let ingestor = FileIngestor::new(store.clone(), 5);
        let err = ingestor
            .ingest(
                transfer_id,
                Actor::User { id: artist_id, role: Role::Artist },
                "big.exr",
                Cursor::new(b"way too much data".to_vec()),
            )
            .await;
        assert!(matches!(err, Err(Error::Precondition(_))));
    }
}
