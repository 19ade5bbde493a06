//! Platform stat, timestamp and attribute queries.

use std::fs::Metadata;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Raw timestamps for one file. `None` means the platform has none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTimes {
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
}

/// Stats a walked path without following symlinks.
pub trait StatSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the path cannot be stat'ed.
    fn stat(&self, path: &Path) -> io::Result<Metadata>;
}

/// `lstat` through `std::fs::symlink_metadata`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStat;

impl StatSource for LinkStat {
    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        std::fs::symlink_metadata(path)
    }
}

/// Resolves a file's created/modified/accessed times.
pub trait TimeSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if no timestamps can be read at all.
    fn times(&self, path: &Path, metadata: &Metadata) -> io::Result<FileTimes>;
}

/// Reports whether a file is hidden.
pub trait AttributeSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the attribute cannot be queried.
    fn is_hidden(&self, path: &Path, metadata: &Metadata) -> io::Result<bool>;
}

/// Times from `std::fs::Metadata`; each missing one stays `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataTimes;

impl TimeSource for MetadataTimes {
    fn times(&self, _path: &Path, metadata: &Metadata) -> io::Result<FileTimes> {
        Ok(FileTimes {
            created: metadata.created().ok(),
            modified: metadata.modified().ok(),
            accessed: metadata.accessed().ok(),
        })
    }
}

/// The native hidden flag: `FILE_ATTRIBUTE_HIDDEN` on Windows, a leading
/// dot elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeAttributes;

#[cfg(windows)]
impl AttributeSource for NativeAttributes {
    fn is_hidden(&self, _path: &Path, metadata: &Metadata) -> io::Result<bool> {
        use std::os::windows::fs::MetadataExt;
        const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
        Ok(metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
    }
}

#[cfg(not(windows))]
impl AttributeSource for NativeAttributes {
    fn is_hidden(&self, path: &Path, _metadata: &Metadata) -> io::Result<bool> {
        let name = path.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
        })?;
        Ok(name.to_string_lossy().starts_with('.'))
    }
}
