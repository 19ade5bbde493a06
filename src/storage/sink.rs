//! Persistence sinks the crawler writes its changes to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::catalog::{delete_file, update_file, upsert_file};
use super::connection::Database;
use super::models::{FileIdentity, FileRecord};
use crate::error::StorageError;
use crate::Result;

/// Where crawl results are persisted.
///
/// Calls are synchronous and made from the crawl task. Implementations own
/// their own locking.
pub trait PersistenceSink: Send + Sync {
    /// Persist a newly discovered file.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be stored.
    fn save(&self, record: &FileRecord) -> Result<()>;

    /// Overwrite a known file.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be stored.
    fn update(&self, record: &FileRecord) -> Result<()>;

    /// Forget a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be removed.
    fn delete(&self, identity: &FileIdentity) -> Result<()>;
}

/// Sink backed by the `SQLite` catalog.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    db: Database,
}

impl SqliteSink {
    /// Create a sink over an initialized database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }
}

impl PersistenceSink for SqliteSink {
    fn save(&self, record: &FileRecord) -> Result<()> {
        // Upsert so a replayed save after a crash is harmless.
        self.db.with_conn(|conn| upsert_file(conn, record))?;
        tracing::trace!(path = record.path(), "Saved file");
        Ok(())
    }

    fn update(&self, record: &FileRecord) -> Result<()> {
        self.db.with_conn(|conn| update_file(conn, record))
    }

    fn delete(&self, identity: &FileIdentity) -> Result<()> {
        let existed = self.db.with_conn(|conn| delete_file(conn, &identity.path))?;
        if !existed {
            tracing::debug!(path = %identity.path, "Delete for file not in catalog");
        }
        Ok(())
    }
}

/// Counts of calls received by a [`MemorySink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkCalls {
    pub saves: u64,
    pub updates: u64,
    pub deletes: u64,
}

/// In-process sink, keyed by path.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<HashMap<String, FileRecord>>,
    saves: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of call counts.
    #[must_use]
    pub fn calls(&self) -> SinkCalls {
        SinkCalls {
            saves: self.saves.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Look up a stored record.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<FileRecord> {
        self.records.lock().get(path).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl PersistenceSink for MemorySink {
    fn save(&self, record: &FileRecord) -> Result<()> {
        self.saves.fetch_add(1, Ordering::Relaxed);
        self.records
            .lock()
            .insert(record.path().to_string(), record.clone());
        Ok(())
    }

    fn update(&self, record: &FileRecord) -> Result<()> {
        self.updates.fetch_add(1, Ordering::Relaxed);
        let mut records = self.records.lock();
        match records.get_mut(record.path()) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StorageError::not_found("file", record.path()).into()),
        }
    }

    fn delete(&self, identity: &FileIdentity) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.records.lock().remove(&identity.path);
        Ok(())
    }
}
