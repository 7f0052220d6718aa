//! File reassembly on disk
//!
//! Uploads land under `<root>/<account>/<file_name>`. Both path components
//! arrive from the wire and are validated by `protocol::parse_name` before
//! they reach this module. Each append opens, writes, and closes the file
//! so no handle outlives a packet.

use crate::checksum;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chunk reassembly and cleanup for one storage root.
pub struct FileIngest {
    root: PathBuf,
}

impl FileIngest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn client_dir(&self, account: &str) -> PathBuf {
        self.root.join(account)
    }

    pub fn file_path(&self, account: &str, file_name: &str) -> PathBuf {
        self.client_dir(account).join(file_name)
    }

    /// Start a transfer: make sure the account directory exists and drop
    /// any stale file left by an interrupted earlier attempt, so a
    /// restarted transfer appends to a clean slate.
    pub fn begin(&self, account: &str, file_name: &str) -> Result<PathBuf, IngestError> {
        let dir = self.client_dir(account);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = self.file_path(account, file_name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(path)
    }

    /// Append one decrypted chunk. Open-write-close per call.
    pub fn append(&self, path: &Path, data: &[u8]) -> Result<(), IngestError> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(data)?;
        Ok(())
    }

    /// Digest the completed file for the CRC report.
    pub fn digest(&self, path: &Path) -> Result<u32, IngestError> {
        Ok(checksum::file_digest(path)?)
    }

    /// Drop a failed transfer: delete the partial file if present, then
    /// remove the account directory if nothing else is left in it.
    pub fn discard(&self, account: &str, file_name: &str) -> Result<(), IngestError> {
        let path = self.file_path(account, file_name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        let dir = self.client_dir(account);
        if dir.exists() && dir.read_dir()?.next().is_none() {
            fs::remove_dir(&dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_creates_client_dir() {
        let root = tempfile::tempdir().expect("tempdir");
        let ingest = FileIngest::new(root.path());

        let path = ingest.begin("alice", "f.txt").expect("begin");
        assert!(root.path().join("alice").is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn test_begin_removes_stale_file() {
        let root = tempfile::tempdir().expect("tempdir");
        let ingest = FileIngest::new(root.path());

        let path = ingest.begin("alice", "f.txt").expect("begin");
        ingest.append(&path, b"stale data").expect("append");
        assert!(path.exists());

        let path = ingest.begin("alice", "f.txt").expect("restart");
        assert!(!path.exists());
    }

    #[test]
    fn test_append_accumulates_and_digest_matches() {
        let root = tempfile::tempdir().expect("tempdir");
        let ingest = FileIngest::new(root.path());

        let path = ingest.begin("alice", "f.txt").expect("begin");
        ingest.append(&path, b"hello ").expect("append");
        ingest.append(&path, b"world").expect("append");

        assert_eq!(fs::read(&path).expect("read"), b"hello world");
        assert_eq!(
            ingest.digest(&path).expect("digest"),
            checksum::bytes_digest(b"hello world")
        );
    }

    #[test]
    fn test_discard_removes_file_and_empty_dir() {
        let root = tempfile::tempdir().expect("tempdir");
        let ingest = FileIngest::new(root.path());

        let path = ingest.begin("alice", "f.txt").expect("begin");
        ingest.append(&path, b"partial").expect("append");

        ingest.discard("alice", "f.txt").expect("discard");
        assert!(!path.exists());
        assert!(!root.path().join("alice").exists());
    }

    #[test]
    fn test_discard_keeps_dir_with_other_files() {
        let root = tempfile::tempdir().expect("tempdir");
        let ingest = FileIngest::new(root.path());

        let kept = ingest.begin("alice", "keep.txt").expect("begin");
        ingest.append(&kept, b"keep").expect("append");
        let partial = ingest.begin("alice", "f.txt").expect("begin");
        ingest.append(&partial, b"partial").expect("append");

        ingest.discard("alice", "f.txt").expect("discard");
        assert!(!partial.exists());
        assert!(kept.exists());
        assert!(root.path().join("alice").is_dir());
    }

    #[test]
    fn test_discard_when_nothing_exists_is_ok() {
        let root = tempfile::tempdir().expect("tempdir");
        let ingest = FileIngest::new(root.path());
        ingest.discard("nobody", "f.txt").expect("discard");
    }
}
