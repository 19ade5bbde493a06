//! File catalog queries.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use super::models::FileRecord;
use crate::error::StorageError;
use crate::Result;

const SELECT_COLUMNS: &str = "path, size, created_at, modified_at, accessed_at, hidden, \
                              attributes, content";

fn millis(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let path: String = row.get(0)?;
    let size: i64 = row.get(1)?;
    let mut record = FileRecord::new(path).with_size(u64::try_from(size).unwrap_or(0));
    record.created_at = from_millis(row.get(2)?);
    record.modified_at = from_millis(row.get(3)?);
    record.accessed_at = from_millis(row.get(4)?);
    record.hidden = row.get(5)?;
    record.attributes = row.get(6)?;
    record.content = row.get(7)?;
    Ok(record)
}

/// Insert a file, replacing any row with the same path.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn upsert_file(conn: &Connection, record: &FileRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO files (path, name, extension, size, created_at, modified_at, \
         accessed_at, hidden, attributes, content, indexed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            record.path(),
            record.name(),
            record.extension(),
            i64::try_from(record.size).unwrap_or(i64::MAX),
            millis(&record.created_at),
            millis(&record.modified_at),
            millis(&record.accessed_at),
            record.hidden,
            record.attributes,
            record.content,
            Utc::now().timestamp(),
        ],
    )
    .map_err(|e| StorageError::Database(e.to_string()))?;
    Ok(())
}

/// Update an existing file row.
///
/// # Errors
///
/// Returns `NotFound` if no row has this path, or a database error.
pub fn update_file(conn: &Connection, record: &FileRecord) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE files SET size = ?, created_at = ?, modified_at = ?, accessed_at = ?, \
             hidden = ?, attributes = ?, content = ?, indexed_at = ? WHERE path = ?",
            rusqlite::params![
                i64::try_from(record.size).unwrap_or(i64::MAX),
                millis(&record.created_at),
                millis(&record.modified_at),
                millis(&record.accessed_at),
                record.hidden,
                record.attributes,
                record.content,
                Utc::now().timestamp(),
                record.path(),
            ],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

    if changed == 0 {
        return Err(StorageError::not_found("file", record.path()).into());
    }
    Ok(())
}

/// Delete a file row. Returns whether a row existed.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_file(conn: &Connection, path: &str) -> Result<bool> {
    let deleted = conn
        .execute("DELETE FROM files WHERE path = ?", [path])
        .map_err(|e| StorageError::Database(e.to_string()))?;
    Ok(deleted > 0)
}

/// Get a file by path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_file(conn: &Connection, path: &str) -> Result<Option<FileRecord>> {
    let result = conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM files WHERE path = ?"),
        [path],
        row_to_record,
    );

    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StorageError::Database(e.to_string()).into()),
    }
}

/// List all cataloged paths.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_file_paths(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT path FROM files ORDER BY path")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let paths = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(paths)
}

/// Load every cataloged record, ordered by path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_files(conn: &Connection) -> Result<Vec<FileRecord>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {SELECT_COLUMNS} FROM files ORDER BY path"))
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let records = stmt
        .query_map([], row_to_record)
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(records)
}

/// Count cataloged files.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_files(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
