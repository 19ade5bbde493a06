//! Shared state for HTTP handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::crawler::{CrawlerStats, Publisher, SnapshotCache};
use crate::storage::Database;

/// Handles the HTTP layer needs into the running crawler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub publisher: Arc<Publisher>,
    pub cache: SnapshotCache,
    pub stats: Arc<CrawlerStats>,
    /// Cancelled on process shutdown; ends open event streams.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create state over an existing database and crawler handles.
    #[must_use]
    pub fn new(
        db: Database,
        publisher: Arc<Publisher>,
        cache: SnapshotCache,
        stats: Arc<CrawlerStats>,
    ) -> Self {
        Self {
            db,
            publisher,
            cache,
            stats,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `shutdown` instead of a private token.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}
