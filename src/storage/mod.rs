//! `SQLite` storage for the file catalog.
//!
//! This module provides:
//! - The catalog connection and migrations
//! - File record models
//! - Persistence sinks the crawler writes to

mod catalog;
mod connection;
mod models;
mod schema;
mod sink;

pub use catalog::{
    count_files, delete_file, get_file, list_file_paths, list_files, update_file, upsert_file,
};
pub use connection::Database;
pub use models::{
    attributes_label, epoch, extension_of, to_utc, FileIdentity, FileRecord, LABEL_HIDDEN,
    LABEL_NORMAL, LABEL_READ_ONLY,
};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};
pub use sink::{MemorySink, PersistenceSink, SinkCalls, SqliteSink};

/// Initialize storage with migrations.
///
/// Migrations run in one transaction; a failure leaves the schema as it was.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_transaction(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
