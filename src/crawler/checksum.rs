//! Content digests for batches of paths.
//!
//! Independent of the crawl: reads whatever is on disk at call time.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;

use crate::error::CrawlError;
use crate::Result;

/// BLAKE3 digest of a file's full content as lowercase hex.
///
/// # Errors
///
/// Returns an error if `path` is not a regular file or cannot be read.
pub fn checksum_file(path: impl AsRef<Path>) -> io::Result<String> {
    let path = path.as_ref();
    // Directories, FIFOs and devices either fail or never reach EOF.
    if !fs::metadata(path)?.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Digest every path in `paths`. Paths that fail are left out of the map.
#[must_use]
pub fn checksum_paths<S: AsRef<str>>(paths: &[S]) -> BTreeMap<String, String> {
    let mut checksums = BTreeMap::new();

    for path in paths {
        let path = path.as_ref();
        if checksums.contains_key(path) {
            continue;
        }
        match checksum_file(path) {
            Ok(digest) => {
                checksums.insert(path.to_string(), digest);
            }
            Err(e) => {
                tracing::debug!(path, error = %e, "Skipping unreadable path");
            }
        }
    }

    checksums
}

/// [`checksum_paths`] on a blocking thread.
///
/// # Errors
///
/// Returns an error only if the blocking task panics or is cancelled.
pub async fn checksum_batch(paths: Vec<String>) -> Result<BTreeMap<String, String>> {
    let requested = paths.len();
    let checksums = tokio::task::spawn_blocking(move || checksum_paths(&paths))
        .await
        .map_err(|e| CrawlError::Task(e.to_string()))?;

    tracing::debug!(requested, hashed = checksums.len(), "Checksum batch complete");
    Ok(checksums)
}
