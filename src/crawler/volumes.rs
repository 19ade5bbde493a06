//! Volume enumeration.
//!
//! Re-run at the start of every cycle, since drives come and go.

use std::path::PathBuf;

/// Source of the roots a crawl cycle walks.
pub trait VolumeEnumerator: Send + Sync {
    /// Every root to walk this cycle. Never fails; an unreadable source
    /// yields an empty list.
    fn list_volumes(&self) -> Vec<PathBuf>;
}

/// Probes a list of candidate roots and keeps the ones that exist.
#[derive(Debug, Clone)]
pub struct ProbedVolumes {
    candidates: Vec<PathBuf>,
}

impl ProbedVolumes {
    /// Probe the given candidates.
    #[must_use]
    pub const fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// Probe the platform's usual volume roots.
    #[must_use]
    pub fn platform() -> Self {
        Self::new(platform_candidates())
    }
}

impl Default for ProbedVolumes {
    fn default() -> Self {
        Self::platform()
    }
}

impl VolumeEnumerator for ProbedVolumes {
    fn list_volumes(&self) -> Vec<PathBuf> {
        let present = self
            .candidates
            .iter()
            .filter(|root| match std::fs::metadata(root) {
                Ok(meta) => meta.is_dir(),
                Err(e) => {
                    tracing::trace!(root = %root.display(), error = %e, "Volume not present");
                    false
                }
            })
            .cloned()
            .collect();
        collapse_nested(present)
    }
}

/// A fixed list of roots from configuration.
///
/// Roots that do not exist right now are skipped for this cycle.
#[derive(Debug, Clone)]
pub struct FixedVolumes {
    inner: ProbedVolumes,
}

impl FixedVolumes {
    /// Use exactly these roots.
    #[must_use]
    pub const fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            inner: ProbedVolumes::new(roots),
        }
    }
}

impl VolumeEnumerator for FixedVolumes {
    fn list_volumes(&self) -> Vec<PathBuf> {
        self.inner.list_volumes()
    }
}

#[cfg(windows)]
fn platform_candidates() -> Vec<PathBuf> {
    ('A'..='Z').map(|d| PathBuf::from(format!("{d}:\\"))).collect()
}

#[cfg(not(windows))]
fn platform_candidates() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

/// Drop duplicates and roots nested under another root.
///
/// A nested root would be walked twice and produce duplicate paths.
#[must_use]
pub fn collapse_nested(mut roots: Vec<PathBuf>) -> Vec<PathBuf> {
    roots.sort_by_key(|r| r.components().count());
    let mut kept: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        if !kept.iter().any(|k| root.starts_with(k)) {
            kept.push(root);
        }
    }
    kept
}
