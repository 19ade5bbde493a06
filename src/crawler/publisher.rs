//! Discovery event fan-out to stream consumers.
//!
//! Every subscriber gets its own bounded queue. A publish waits for all
//! live subscribers to accept the event, so a slow consumer slows the crawl,
//! but only up to `send_timeout`: after that the consumer is detached and
//! its stream ends.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::server::metrics::{EVENTS_PUBLISHED, STREAM_SUBSCRIBERS};
use crate::storage::{FileIdentity, FileRecord};

/// One element of the discovery stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    /// First sighting of a file.
    Added(FileRecord),
    /// A file already in the cache, seen again this cycle.
    Present(FileRecord),
    /// A cached file whose size or mtime changed.
    Updated(FileRecord),
    /// A cached file that is gone.
    Removed(FileIdentity),
}

impl DiscoveryEvent {
    /// Wire name of the event kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Present(_) => "present",
            Self::Updated(_) => "updated",
            Self::Removed(_) => "removed",
        }
    }

    /// Path the event is about.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Added(r) | Self::Present(r) | Self::Updated(r) => r.path(),
            Self::Removed(id) => &id.path,
        }
    }
}

struct Subscriber {
    id: Uuid,
    scope: String,
    tx: mpsc::Sender<Arc<DiscoveryEvent>>,
}

/// Receiving end handed to a stream consumer.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<Arc<DiscoveryEvent>>,
}

impl Subscription {
    /// Subscriber id, used in logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` once detached.
    pub async fn recv(&mut self) -> Option<Arc<DiscoveryEvent>> {
        self.rx.recv().await
    }

    /// Next event if one is queued.
    pub fn try_recv(&mut self) -> Option<Arc<DiscoveryEvent>> {
        self.rx.try_recv().ok()
    }

    /// Convert into a `Stream`.
    #[must_use]
    pub fn into_stream(self) -> ReceiverStream<Arc<DiscoveryEvent>> {
        ReceiverStream::new(self.rx)
    }
}

/// Fan-out hub shared by the crawl task and the stream endpoint.
pub struct Publisher {
    subscribers: Mutex<Vec<Subscriber>>,
    buffer: usize,
    send_timeout: Duration,
}

impl Publisher {
    /// Create a publisher with a per-subscriber queue of `buffer` events.
    #[must_use]
    pub fn new(buffer: usize, send_timeout: Duration) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            buffer: buffer.max(1),
            send_timeout,
        }
    }

    /// Attach a new consumer. `scope_hint` is informational only.
    pub fn subscribe(&self, scope_hint: impl Into<String>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        let scope = scope_hint.into();

        let mut subscribers = self.subscribers.lock();
        subscribers.push(Subscriber {
            id,
            scope: scope.clone(),
            tx,
        });
        STREAM_SUBSCRIBERS.set(i64::try_from(subscribers.len()).unwrap_or(i64::MAX));
        drop(subscribers);

        tracing::info!(subscriber = %id, scope = %scope, "Stream subscriber attached");
        Subscription { id, rx }
    }

    /// Number of attached consumers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Deliver `event` to every subscriber. Returns how many accepted it.
    pub async fn publish(&self, event: DiscoveryEvent) -> usize {
        let targets: Vec<(Uuid, mpsc::Sender<Arc<DiscoveryEvent>>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|s| (s.id, s.tx.clone()))
            .collect();

        EVENTS_PUBLISHED.with_label_values(&[event.kind()]).inc();
        if targets.is_empty() {
            return 0;
        }

        let event = Arc::new(event);
        let timeout = self.send_timeout;
        let sends = targets.into_iter().map(|(id, tx)| {
            let event = Arc::clone(&event);
            async move {
                match tokio::time::timeout(timeout, tx.send(event)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(_)) => Some((id, "disconnected")),
                    Err(_) => Some((id, "send timed out")),
                }
            }
        });

        let results = join_all(sends).await;
        let total = results.len();
        let dead: Vec<(Uuid, &str)> = results.into_iter().flatten().collect();
        for (id, reason) in &dead {
            self.detach(*id, reason);
        }
        total - dead.len()
    }

    fn detach(&self, id: Uuid, reason: &str) {
        let mut subscribers = self.subscribers.lock();
        if let Some(pos) = subscribers.iter().position(|s| s.id == id) {
            let removed = subscribers.remove(pos);
            tracing::info!(
                subscriber = %id,
                scope = %removed.scope,
                reason,
                "Stream subscriber detached"
            );
        }
        STREAM_SUBSCRIBERS.set(i64::try_from(subscribers.len()).unwrap_or(i64::MAX));
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("subscribers", &self.subscriber_count())
            .field("buffer", &self.buffer)
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}
