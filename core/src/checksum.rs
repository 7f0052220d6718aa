//! End-to-end integrity digest over a completed upload

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Streaming CRC32 over a file's contents.
pub fn file_digest(path: &Path) -> io::Result<u32> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// CRC32 over an in-memory buffer. The client computes its side of the
/// comparison this way; tests use it as the independent reference.
pub fn bytes_digest(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_digest_matches_bytes_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.bin");
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 241) as u8).collect();
        File::create(&path)
            .and_then(|mut f| f.write_all(&data))
            .expect("write");

        assert_eq!(file_digest(&path).expect("digest"), bytes_digest(&data));
    }

    #[test]
    fn test_empty_file_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty");
        File::create(&path).expect("create");
        assert_eq!(file_digest(&path).expect("digest"), bytes_digest(&[]));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(file_digest(Path::new("/nonexistent/definitely-not-here")).is_err());
    }
}
