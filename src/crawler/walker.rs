//! Lazy recursive walk of one volume.
//!
//! Only regular files are yielded. Symlinks are not followed and, like
//! FIFOs, sockets and devices, are counted as skipped. Permission errors are
//! skipped; any other I/O error ends the walk with a single
//! `CrawlError::Walk`.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use walkdir::{DirEntry, WalkDir};

use super::filter::PathFilter;
use super::platform::{LinkStat, StatSource};
use crate::error::CrawlError;

/// A regular file found by the walk.
#[derive(Debug)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Per-walk counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub files: u64,
    /// Inaccessible paths and non-regular files.
    pub skipped: u64,
}

/// What to do with an I/O error met during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Log and continue with siblings.
    Skip,
    /// Abort the volume.
    Abort,
}

/// Classify a walk error by kind. `at_root` is true for the volume root.
#[must_use]
pub fn classify(kind: io::ErrorKind, at_root: bool) -> Disposition {
    match kind {
        io::ErrorKind::PermissionDenied => Disposition::Skip,
        // Deleted between listing and stat.
        io::ErrorKind::NotFound if !at_root => Disposition::Skip,
        _ => Disposition::Abort,
    }
}

type Entries = Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>;

/// Iterator over the files of one volume.
pub struct VolumeWalk {
    root: PathBuf,
    entries: Entries,
    stat: Arc<dyn StatSource>,
    cancel: CancellationToken,
    finished: bool,
    stats: WalkStats,
}

/// Start a walk of `root`.
///
/// Nothing touches the filesystem until the iterator is polled.
#[must_use]
pub fn walk(root: &Path, filter: Arc<PathFilter>, cancel: CancellationToken) -> VolumeWalk {
    let entries = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(move |e| {
            e.depth() == 0 || !filter.is_excluded(e.path(), e.file_type().is_dir())
        });

    VolumeWalk {
        root: root.to_path_buf(),
        entries: Box::new(entries),
        stat: Arc::new(LinkStat),
        cancel,
        finished: false,
        stats: WalkStats::default(),
    }
}

impl VolumeWalk {
    /// Replace the source used to stat each file.
    #[must_use]
    pub fn with_stat_source(mut self, stat: Arc<dyn StatSource>) -> Self {
        self.stat = stat;
        self
    }

    /// The volume being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> WalkStats {
        self.stats
    }

    fn fail(&mut self, path: Option<&Path>, err: &io::Error) -> CrawlError {
        self.finished = true;
        let reason = path.map_or_else(
            || err.to_string(),
            |p| format!("{}: {err}", p.display()),
        );
        CrawlError::walk(self.root.to_string_lossy(), reason)
    }

    /// Handle one error; `Some` ends the walk.
    fn on_error(
        &mut self,
        path: Option<&Path>,
        depth: usize,
        err: &io::Error,
    ) -> Option<CrawlError> {
        match classify(err.kind(), depth == 0) {
            Disposition::Skip => {
                self.stats.skipped += 1;
                tracing::debug!(
                    root = %self.root.display(),
                    path = ?path,
                    error = %err,
                    "Skipping inaccessible path"
                );
                None
            }
            Disposition::Abort => Some(self.fail(path, err)),
        }
    }
}

impl Iterator for VolumeWalk {
    type Item = std::result::Result<WalkEntry, CrawlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if self.cancel.is_cancelled() {
                self.finished = true;
                return Some(Err(CrawlError::Cancelled));
            }

            let Some(next) = self.entries.next() else {
                self.finished = true;
                return None;
            };

            match next {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        continue;
                    }
                    if !file_type.is_file() {
                        // Opening a FIFO or device can block indefinitely.
                        self.stats.skipped += 1;
                        tracing::trace!(
                            path = %entry.path().display(),
                            "Skipping non-regular file"
                        );
                        continue;
                    }
                    match self.stat.stat(entry.path()) {
                        Ok(metadata) => {
                            self.stats.files += 1;
                            return Some(Ok(WalkEntry {
                                path: entry.into_path(),
                                metadata,
                            }));
                        }
                        Err(e) => {
                            let fatal = self.on_error(Some(entry.path()), entry.depth(), &e);
                            if let Some(fatal) = fatal {
                                return Some(Err(fatal));
                            }
                        }
                    }
                }
                Err(e) => {
                    let depth = e.depth();
                    let path = e.path().map(Path::to_path_buf);
                    match e.into_io_error() {
                        Some(io_err) => {
                            if let Some(fatal) = self.on_error(path.as_deref(), depth, &io_err) {
                                return Some(Err(fatal));
                            }
                        }
                        // Symlink loops; only possible when following links.
                        None => self.stats.skipped += 1,
                    }
                }
            }
        }
    }
}
