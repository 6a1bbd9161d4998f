// src/filesystem/hash.rs

//! Chunked SHA-256 hashing (SPEC_FULL §4.8), used by the ingestion path,
//! the copy worker's hash-while-copy step, and the verify worker's
//! re-hash. Reads in 1 MiB chunks so hashing a multi-gigabyte render
//! output never holds the whole file in memory.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::Result;

const CHUNK_SIZE: usize = 1024 * 1024;

/// Hash a file on disk, reading in 1 MiB chunks.
pub async fn hash_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = tokio::fs::File::open(path.as_ref()).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Incremental hasher for the copy worker: fed the same chunks being
/// written to the destination so the checksum is produced without a
/// second read pass over the source file.
#[derive(Default)]
pub struct ChunkedHasher {
    hasher: Sha256,
}

impl ChunkedHasher {
    pub fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn hash_file_matches_known_digest() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        tmp.flush().unwrap();

        let digest = hash_file(tmp.path()).await.unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde"
        );
    }

    #[tokio::test]
    async fn hash_file_handles_multi_chunk_input() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let payload = vec![0xABu8; CHUNK_SIZE * 2 + 17];
        tmp.write_all(&payload).unwrap();
        tmp.flush().unwrap();

        let streamed = hash_file(tmp.path()).await.unwrap();

        let mut hasher = Sha256::new();
        hasher.update(&payload);
        let expected = format!("{:x}", hasher.finalize());

        assert_eq!(streamed, expected);
    }

    #[test]
    fn chunked_hasher_matches_single_pass() {
        let mut hasher = ChunkedHasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        let chunked = hasher.finish();

        let mut single = Sha256::new();
        single.update(b"hello world");
        let expected = format!("{:x}", single.finalize());

        assert_eq!(chunked, expected);
    }
}
