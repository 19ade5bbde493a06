//! Data models for the file catalog.
//!
//! This module defines the core data structures used for:
//! - Indexed file records
//! - File identities used to invalidate downstream state

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Display label for hidden files.
pub const LABEL_HIDDEN: &str = "Hidden";
/// Display label for read-only files.
pub const LABEL_READ_ONLY: &str = "Read Only";
/// Display label for everything else.
pub const LABEL_NORMAL: &str = "Normal";

/// The Unix epoch, used when the platform cannot supply a timestamp.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::from(UNIX_EPOCH)
}

/// Convert a platform timestamp, falling back to the epoch.
#[must_use]
pub fn to_utc(time: Option<SystemTime>) -> DateTime<Utc> {
    time.map_or_else(epoch, DateTime::<Utc>::from)
}

/// Cosmetic attribute label. Hidden wins over read-only.
#[must_use]
pub const fn attributes_label(hidden: bool, read_only: bool) -> &'static str {
    if hidden {
        LABEL_HIDDEN
    } else if read_only {
        LABEL_READ_ONLY
    } else {
        LABEL_NORMAL
    }
}

/// One indexed file at a point in time.
///
/// `path`, `name` and `extension` are fixed at construction; the extension
/// is always derived from the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    path: String,
    name: String,
    extension: String,

    /// File size in bytes.
    pub size: u64,

    /// Creation time (epoch when unavailable).
    pub created_at: DateTime<Utc>,

    /// Last modification time (epoch when unavailable).
    pub modified_at: DateTime<Utc>,

    /// Last access time (epoch when unavailable).
    pub accessed_at: DateTime<Utc>,

    /// Whether the platform reports the file as hidden.
    pub hidden: bool,

    /// Display label, see [`attributes_label`].
    pub attributes: String,

    /// Extracted text. Empty when nothing could be extracted.
    pub content: String,
}

impl FileRecord {
    /// Create a record for `path` with empty metadata.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let as_path = Path::new(&path);
        let name = as_path
            .file_name()
            .map_or_else(|| path.clone(), |n| n.to_string_lossy().into_owned());
        let extension = extension_of(as_path);

        Self {
            path,
            name,
            extension,
            size: 0,
            created_at: epoch(),
            modified_at: epoch(),
            accessed_at: epoch(),
            hidden: false,
            attributes: LABEL_NORMAL.to_string(),
            content: String::new(),
        }
    }

    /// Set the size in bytes.
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Set the modification time.
    #[must_use]
    pub const fn with_modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = modified_at;
        self
    }

    /// Set the extracted content.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Absolute path, the catalog key.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File name component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase extension without the dot, empty if there is none.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Identity used to delete this record downstream.
    #[must_use]
    pub fn identity(&self) -> FileIdentity {
        FileIdentity {
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }

    /// True when size or modification time differ from `other`.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.size != other.size || self.modified_at != other.modified_at
    }
}

/// Just enough of a record to invalidate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileIdentity {
    /// Absolute path.
    pub path: String,
    /// File name component.
    pub name: String,
}

/// Lowercase extension of `path` without the leading dot.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_derives_name_and_extension() {
        let record = FileRecord::new("/vol/docs/Report.DOCX");
        assert_eq!(record.path(), "/vol/docs/Report.DOCX");
        assert_eq!(record.name(), "Report.DOCX");
        assert_eq!(record.extension(), "docx");
        assert_eq!(record.size, 0);
        assert_eq!(record.created_at, epoch());
        assert!(record.content.is_empty());
    }

    #[test]
    fn test_no_extension() {
        let record = FileRecord::new("/vol/Makefile");
        assert_eq!(record.extension(), "");

        let dotfile = FileRecord::new("/home/u/.bashrc");
        assert_eq!(dotfile.extension(), "");
        assert_eq!(dotfile.name(), ".bashrc");
    }

    #[test]
    fn test_identity() {
        let record = FileRecord::new("/vol/a.txt");
        let identity = record.identity();
        assert_eq!(identity.path, "/vol/a.txt");
        assert_eq!(identity.name, "a.txt");
    }

    #[test]
    fn test_differs_from() {
        let a = FileRecord::new("/vol/a.txt").with_size(10);
        let same = a.clone().with_content("ignored for comparison");
        let bigger = a.clone().with_size(11);
        let touched = a
            .clone()
            .with_modified_at(DateTime::from_timestamp(1_700_000_000, 0).unwrap());

        assert!(!a.differs_from(&same));
        assert!(a.differs_from(&bigger));
        assert!(a.differs_from(&touched));
    }

    #[test]
    fn test_attributes_label() {
        assert_eq!(attributes_label(true, true), "Hidden");
        assert_eq!(attributes_label(false, true), "Read Only");
        assert_eq!(attributes_label(false, false), "Normal");
    }

    #[test]
    fn test_to_utc_missing_time() {
        assert_eq!(to_utc(None), epoch());
        assert_eq!(to_utc(Some(UNIX_EPOCH)), epoch());
    }

    #[test]
    fn test_serializes_all_fields() {
        let record = FileRecord::new("/vol/a.txt").with_size(10);
        let json = serde_json::to_value(&record).unwrap();
        for field in [
            "path",
            "name",
            "extension",
            "size",
            "created_at",
            "modified_at",
            "accessed_at",
            "hidden",
            "attributes",
            "content",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["size"], 10);
    }
}
