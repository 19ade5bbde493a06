//! The perpetual crawl loop.
//!
//! One cycle enumerates volumes, walks each one on a blocking thread, and
//! feeds the extracted records back to the crawl task over a bounded
//! channel. The crawl task diffs every record against the cache as it
//! arrives, writes to the sink, and publishes events. The cache is only
//! replaced once the cycle finishes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::extract::MetadataExtractor;
use super::filter::PathFilter;
use super::platform::{LinkStat, StatSource};
use super::publisher::{DiscoveryEvent, Publisher};
use super::snapshot::{diff, DiffPolicy, Snapshot, SnapshotCache};
use super::volumes::VolumeEnumerator;
use super::walker::{walk, WalkStats};
use crate::config::Config;
use crate::error::CrawlError;
use crate::server::metrics::{CYCLES_TOTAL, CYCLE_DURATION, FILES_TOTAL, SINK_FAILURES};
use crate::server::spans;
use crate::storage::{FileRecord, PersistenceSink};

/// Crawl loop settings.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub interval: Duration,
    pub policy: DiffPolicy,
    /// Gitignore-style patterns, anchored at each volume root.
    pub exclude: Vec<String>,
    /// Records in flight between a walk thread and the crawl task.
    pub walk_buffer: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            policy: DiffPolicy::PresenceOnly,
            exclude: Vec::new(),
            walk_buffer: 256,
        }
    }
}

impl From<&Config> for CrawlerConfig {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.cycle_interval(),
            policy: if config.detect_modified {
                DiffPolicy::DetectModified
            } else {
                DiffPolicy::PresenceOnly
            },
            exclude: config.exclude.clone(),
            walk_buffer: config.walk_buffer,
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Every volume was walked.
    Completed,
    /// At least one volume failed; its cache entries were carried over.
    Partial,
    /// Nothing to walk; cache untouched.
    NoVolumes,
    /// Shutdown interrupted the cycle; cache untouched.
    Cancelled,
}

impl CycleOutcome {
    /// Metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::NoVolumes => "no_volumes",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Summary of one crawl cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: CycleOutcome,
    pub volumes_walked: usize,
    pub volumes_failed: usize,
    pub files_seen: u64,
    pub paths_skipped: u64,
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub sink_failures: u64,
}

/// Crawl statistics shared with the HTTP layer.
#[derive(Debug, Default)]
pub struct CrawlerStats {
    cycles: AtomicU64,
    last: RwLock<Option<CycleReport>>,
}

impl CrawlerStats {
    /// Create new stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> CrawlerStatsSnapshot {
        CrawlerStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            last_cycle: self.last.read().clone(),
        }
    }

    fn next_cycle(&self) -> u64 {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record(&self, report: CycleReport) {
        *self.last.write() = Some(report);
    }
}

/// Snapshot of crawler stats.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlerStatsSnapshot {
    pub cycles: u64,
    pub last_cycle: Option<CycleReport>,
}

/// Running totals for the cycle in progress.
#[derive(Debug, Default)]
struct Tally {
    files_seen: u64,
    skipped: u64,
    sink_failures: u64,
}

/// The crawl task. Sole writer of the [`SnapshotCache`].
pub struct Crawler {
    volumes: Arc<dyn VolumeEnumerator>,
    extractor: MetadataExtractor,
    sink: Arc<dyn PersistenceSink>,
    publisher: Arc<Publisher>,
    stat: Arc<dyn StatSource>,
    cache: SnapshotCache,
    stats: Arc<CrawlerStats>,
    config: CrawlerConfig,
}

impl Crawler {
    /// Create a crawler over its collaborators.
    #[must_use]
    pub fn new(
        volumes: Arc<dyn VolumeEnumerator>,
        extractor: MetadataExtractor,
        sink: Arc<dyn PersistenceSink>,
        publisher: Arc<Publisher>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            volumes,
            extractor,
            sink,
            publisher,
            stat: Arc::new(LinkStat),
            cache: SnapshotCache::new(),
            stats: Arc::new(CrawlerStats::new()),
            config,
        }
    }

    /// Start from records persisted by an earlier run.
    ///
    /// Anything seeded here that the first cycle does not find is deleted
    /// from the sink and announced as removed.
    #[must_use]
    pub fn with_known_files(self, records: impl IntoIterator<Item = FileRecord>) -> Self {
        let seeded: Snapshot = records.into_iter().collect();
        tracing::info!(files = seeded.len(), "Crawl cache seeded from catalog");
        self.cache.replace(seeded);
        self
    }

    /// Replace the source used to stat walked files.
    #[must_use]
    pub fn with_stat_source(mut self, stat: Arc<dyn StatSource>) -> Self {
        self.stat = stat;
        self
    }

    /// Read handle to the cache.
    #[must_use]
    pub fn cache(&self) -> SnapshotCache {
        self.cache.clone()
    }

    /// Shared stats handle.
    #[must_use]
    pub fn stats(&self) -> Arc<CrawlerStats> {
        Arc::clone(&self.stats)
    }

    /// Run cycles until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs_f64(),
            policy = ?self.config.policy,
            "Crawler started"
        );

        loop {
            self.run_cycle(&shutdown).await;

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.config.interval) => {}
            }
        }

        tracing::info!("Crawler stopped");
    }

    /// Run one full cycle.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport {
            cycle: self.stats.next_cycle(),
            started_at: Utc::now(),
            duration_ms: 0,
            outcome: CycleOutcome::Completed,
            volumes_walked: 0,
            volumes_failed: 0,
            files_seen: 0,
            paths_skipped: 0,
            added: 0,
            removed: 0,
            updated: 0,
            sink_failures: 0,
        };

        let roots = self.volumes.list_volumes();
        if roots.is_empty() {
            tracing::warn!(cycle = report.cycle, "No volumes to crawl");
            report.outcome = CycleOutcome::NoVolumes;
            return self.finish(report, started);
        }

        tracing::debug!(cycle = report.cycle, volumes = roots.len(), "Crawl cycle starting");

        let previous = self.cache.current();
        let mut next = Snapshot::new();
        let mut tally = Tally::default();

        for root in &roots {
            let walked = self
                .crawl_volume(report.cycle, root, &previous, &mut next, &mut tally, cancel)
                .await;
            match walked {
                Ok(stats) => {
                    report.volumes_walked += 1;
                    tracing::debug!(
                        root = %root.display(),
                        files = stats.files,
                        skipped = stats.skipped,
                        "Volume walked"
                    );
                    self.remove_unseen(previous.under(root), &mut next, &mut tally)
                        .await;
                }
                Err(CrawlError::Cancelled) => {
                    tracing::info!(cycle = report.cycle, "Crawl cycle cancelled");
                    report.outcome = CycleOutcome::Cancelled;
                    report.files_seen = tally.files_seen;
                    report.sink_failures = tally.sink_failures;
                    return self.finish(report, started);
                }
                Err(e) => {
                    report.volumes_failed += 1;
                    tracing::warn!(
                        root = %root.display(),
                        error = %e,
                        "Volume walk failed, keeping previous entries"
                    );
                    for record in previous.under(root) {
                        if !next.contains(record.path()) {
                            next.insert(record.clone());
                        }
                    }
                }
            }
        }

        // Entries whose volume disappeared.
        let orphaned = previous
            .records()
            .filter(|r| !roots.iter().any(|root| Path::new(r.path()).starts_with(root)));
        self.remove_unseen(orphaned, &mut next, &mut tally).await;

        let changes = diff(&next, &previous, self.config.policy);
        report.added = changes.added.len();
        report.removed = changes.removed.len();
        report.updated = changes.updated.len();
        report.files_seen = tally.files_seen;
        report.paths_skipped = tally.skipped;
        report.sink_failures = tally.sink_failures;
        if report.volumes_failed > 0 {
            report.outcome = CycleOutcome::Partial;
        }

        FILES_TOTAL.set(i64::try_from(next.len()).unwrap_or(i64::MAX));
        self.cache.replace(next);

        self.finish(report, started)
    }

    fn finish(&self, mut report: CycleReport, started: Instant) -> CycleReport {
        let elapsed = started.elapsed();
        report.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        CYCLES_TOTAL
            .with_label_values(&[report.outcome.as_str()])
            .inc();
        CYCLE_DURATION.observe(elapsed.as_secs_f64());

        if report.outcome != CycleOutcome::NoVolumes {
            tracing::info!(
                cycle = report.cycle,
                outcome = report.outcome.as_str(),
                files = report.files_seen,
                added = report.added,
                removed = report.removed,
                updated = report.updated,
                failed_volumes = report.volumes_failed,
                sink_failures = report.sink_failures,
                duration_ms = report.duration_ms,
                "Crawl cycle finished"
            );
        }

        self.stats.record(report.clone());
        report
    }

    /// Walk one volume, streaming records into `next`.
    async fn crawl_volume(
        &self,
        cycle: u64,
        root: &Path,
        previous: &Snapshot,
        next: &mut Snapshot,
        tally: &mut Tally,
        cancel: &CancellationToken,
    ) -> Result<WalkStats, CrawlError> {
        let filter = PathFilter::with_patterns(root, &self.config.exclude)
            .map_err(|e| CrawlError::walk(root.to_string_lossy(), e.to_string()))?;

        let (tx, mut rx) = mpsc::channel(self.config.walk_buffer.max(1));
        let walk_root: PathBuf = root.to_path_buf();
        let extractor = self.extractor.clone();
        let stat = Arc::clone(&self.stat);
        let walk_cancel = cancel.clone();
        let span = spans::volume_span(cycle, root);

        let handle = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut entries =
                walk(&walk_root, Arc::new(filter), walk_cancel).with_stat_source(stat);
            for item in entries.by_ref() {
                let item = item.map(|e| extractor.extract(&e.path, &e.metadata));
                if tx.blocking_send(item).is_err() {
                    tracing::debug!(root = %walk_root.display(), "Crawl task stopped receiving");
                    break;
                }
            }
            entries.stats()
        });

        let mut failure = None;
        while let Some(item) = rx.recv().await {
            match item {
                Ok(record) => {
                    tally.files_seen += 1;
                    self.accept(record, previous, next, tally).await;
                }
                Err(e) => failure = Some(e),
            }
        }

        let stats = handle.await.map_err(|e| CrawlError::Task(e.to_string()))?;
        tally.skipped += stats.skipped;

        match failure {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    /// Diff one record against the cache, persist, and publish.
    async fn accept(
        &self,
        record: FileRecord,
        previous: &Snapshot,
        next: &mut Snapshot,
        tally: &mut Tally,
    ) {
        let event = match previous.get(record.path()) {
            None => {
                // Left out of the cache on failure so the next cycle retries.
                if persist("save", record.path(), self.sink.save(&record), tally) {
                    next.insert(record.clone());
                }
                DiscoveryEvent::Added(record)
            }
            Some(old)
                if self.config.policy == DiffPolicy::DetectModified
                    && record.differs_from(old) =>
            {
                if persist("update", record.path(), self.sink.update(&record), tally) {
                    next.insert(record.clone());
                } else {
                    next.insert(old.clone());
                }
                DiscoveryEvent::Updated(record)
            }
            Some(_) => {
                next.insert(record.clone());
                DiscoveryEvent::Present(record)
            }
        };

        self.publisher.publish(event).await;
    }

    /// Delete and announce every record from `candidates` missing in `next`.
    async fn remove_unseen<'a>(
        &self,
        candidates: impl Iterator<Item = &'a FileRecord>,
        next: &mut Snapshot,
        tally: &mut Tally,
    ) {
        let gone: Vec<&FileRecord> = candidates.filter(|r| !next.contains(r.path())).collect();

        for record in gone {
            let identity = record.identity();
            if !persist("delete", record.path(), self.sink.delete(&identity), tally) {
                // Still cached, so the delete is retried next cycle.
                next.insert(record.clone());
            }
            self.publisher.publish(DiscoveryEvent::Removed(identity)).await;
        }
    }
}

impl std::fmt::Debug for Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crawler")
            .field("extractor", &self.extractor)
            .field("publisher", &self.publisher)
            .field("cache_len", &self.cache.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Log and count a failed sink call. Returns true on success.
fn persist(
    operation: &'static str,
    path: &str,
    result: crate::Result<()>,
    tally: &mut Tally,
) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tally.sink_failures += 1;
            SINK_FAILURES.with_label_values(&[operation]).inc();
            tracing::warn!(operation, path, error = %e, "Persistence sink call failed");
            false
        }
    }
}
