//! Path exclusion for volume walks.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::Result;

/// Kernel pseudo-filesystems that are never worth indexing.
#[cfg(unix)]
const PSEUDO_FS_ROOTS: &[&str] = &["/proc", "/sys", "/dev", "/run"];

#[cfg(not(unix))]
const PSEUDO_FS_ROOTS: &[&str] = &[];

/// Decides which paths a walk prunes.
#[derive(Debug)]
pub struct PathFilter {
    gitignore: Option<Gitignore>,
    pruned_roots: Vec<PathBuf>,
}

impl PathFilter {
    /// Filter with only the built-in pseudo-filesystem exclusions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gitignore: None,
            pruned_roots: PSEUDO_FS_ROOTS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Filter with extra gitignore-style patterns, anchored at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid.
    pub fn with_patterns(root: impl AsRef<Path>, patterns: &[String]) -> Result<Self> {
        let mut filter = Self::new();
        if patterns.is_empty() {
            return Ok(filter);
        }

        let mut builder = GitignoreBuilder::new(root.as_ref());
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| crate::Error::config(format!("invalid exclude pattern: {e}")))?;
        }

        filter.gitignore = Some(
            builder
                .build()
                .map_err(|e| crate::Error::config(format!("failed to build excludes: {e}")))?,
        );
        Ok(filter)
    }

    /// Whether the walk should skip `path` (and everything under it).
    #[must_use]
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        if self.pruned_roots.iter().any(|r| path == r) {
            return true;
        }

        self.gitignore
            .as_ref()
            .is_some_and(|gi| gi.matched(path, is_dir).is_ignore())
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new()
    }
}
