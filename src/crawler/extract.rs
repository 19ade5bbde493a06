//! Metadata and content extraction.
//!
//! Content extraction is dispatched by extension through an
//! [`ExtractorRegistry`]; new formats are added by registering another
//! [`ContentExtractor`], without touching the walker.

use std::collections::HashMap;
use std::fs::{File, Metadata};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use super::platform::{AttributeSource, MetadataTimes, NativeAttributes, TimeSource};
use crate::error::CrawlError;
use crate::storage::{attributes_label, to_utc, FileRecord};
use crate::Result;

/// Extensions handled by [`PlainTextExtractor`] in the default registry.
pub const PLAIN_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "log", "json", "xml", "yaml", "yml", "toml", "ini", "html", "htm",
];

/// Turns one file into searchable text.
pub trait ContentExtractor: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Reads a text file up to a byte limit, replacing invalid UTF-8.
#[derive(Debug, Clone, Copy)]
pub struct PlainTextExtractor {
    max_bytes: u64,
}

impl PlainTextExtractor {
    /// Create an extractor that reads at most `max_bytes`.
    #[must_use]
    pub const fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl ContentExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| CrawlError::extraction(path.to_string_lossy(), e.to_string()))?;
        if !metadata.is_file() {
            let reason = "not a regular file";
            return Err(CrawlError::extraction(path.to_string_lossy(), reason).into());
        }

        let file = File::open(path)
            .map_err(|e| CrawlError::extraction(path.to_string_lossy(), e.to_string()))?;

        let mut buf = Vec::new();
        file.take(self.max_bytes)
            .read_to_end(&mut buf)
            .map_err(|e| CrawlError::extraction(path.to_string_lossy(), e.to_string()))?;

        Ok(String::from_utf8_lossy(&buf).trim().to_string())
    }
}

/// Extension → extractor lookup. Keys are lowercase, without the dot.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn ContentExtractor>>,
}

impl ExtractorRegistry {
    /// Empty registry: every file gets empty content.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the plain-text extractor for common text formats.
    #[must_use]
    pub fn with_defaults(max_content_bytes: u64) -> Self {
        let mut registry = Self::new();
        let plain: Arc<dyn ContentExtractor> = Arc::new(PlainTextExtractor::new(max_content_bytes));
        for ext in PLAIN_TEXT_EXTENSIONS {
            registry.register(ext, Arc::clone(&plain));
        }
        registry
    }

    /// Register (or replace) the extractor for `extension`.
    pub fn register(&mut self, extension: &str, extractor: Arc<dyn ContentExtractor>) {
        let key = extension.trim_start_matches('.').to_lowercase();
        self.extractors.insert(key, extractor);
    }

    /// Extractor for `extension`, if any.
    #[must_use]
    pub fn get(&self, extension: &str) -> Option<&Arc<dyn ContentExtractor>> {
        self.extractors.get(&extension.to_lowercase())
    }

    /// Number of registered extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.extractors.keys().collect();
        keys.sort();
        f.debug_struct("ExtractorRegistry")
            .field("extensions", &keys)
            .finish()
    }
}

/// Builds a [`FileRecord`] from a walked entry.
///
/// Never fails: every platform query degrades to a default and a failing
/// content extractor leaves the content empty.
#[derive(Clone)]
pub struct MetadataExtractor {
    registry: Arc<ExtractorRegistry>,
    times: Arc<dyn TimeSource>,
    attributes: Arc<dyn AttributeSource>,
}

impl MetadataExtractor {
    /// Extractor using the native platform queries.
    #[must_use]
    pub fn new(registry: ExtractorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            times: Arc::new(MetadataTimes),
            attributes: Arc::new(NativeAttributes),
        }
    }

    /// Replace the timestamp source.
    #[must_use]
    pub fn with_time_source(mut self, times: Arc<dyn TimeSource>) -> Self {
        self.times = times;
        self
    }

    /// Replace the hidden-attribute source.
    #[must_use]
    pub fn with_attribute_source(mut self, attributes: Arc<dyn AttributeSource>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Extract the record for `path`.
    #[must_use]
    pub fn extract(&self, path: &Path, metadata: &Metadata) -> FileRecord {
        let mut record = FileRecord::new(path.to_string_lossy()).with_size(metadata.len());

        match self.times.times(path, metadata) {
            Ok(times) => {
                record.created_at = to_utc(times.created);
                record.modified_at = to_utc(times.modified);
                record.accessed_at = to_utc(times.accessed);
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Timestamps unavailable");
            }
        }

        record.hidden = self
            .attributes
            .is_hidden(path, metadata)
            .unwrap_or_else(|e| {
                tracing::debug!(path = %path.display(), error = %e, "Hidden flag unavailable");
                false
            });
        record.attributes =
            attributes_label(record.hidden, metadata.permissions().readonly()).to_string();

        let extractor = metadata
            .is_file()
            .then(|| self.registry.get(record.extension()))
            .flatten();
        if let Some(extractor) = extractor {
            match extractor.extract(path) {
                Ok(text) => record.content = text,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        extension = record.extension(),
                        error = %e,
                        "Content extraction failed, indexing metadata only"
                    );
                }
            }
        }

        record
    }
}

impl std::fmt::Debug for MetadataExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataExtractor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::platform::FileTimes;
    use crate::storage::epoch;
    use std::io;
    use tempfile::TempDir;

    struct FailingExtractor;

    impl ContentExtractor for FailingExtractor {
        fn extract(&self, path: &Path) -> Result<String> {
            Err(CrawlError::extraction(path.to_string_lossy(), "corrupt document").into())
        }
    }

    struct BrokenClock;

    impl TimeSource for BrokenClock {
        fn times(&self, _path: &Path, _metadata: &Metadata) -> io::Result<FileTimes> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no clock"))
        }
    }

    struct BrokenAttributes;

    impl AttributeSource for BrokenAttributes {
        fn is_hidden(&self, _path: &Path, _metadata: &Metadata) -> io::Result<bool> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no attributes"))
        }
    }

    fn write(dir: &TempDir, name: &str, body: &str) -> (std::path::PathBuf, Metadata) {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        (path, meta)
    }

    #[test]
    fn test_plain_text_is_extracted() {
        let tmp = TempDir::new().unwrap();
        let (path, meta) = write(&tmp, "notes.TXT", "  meeting notes\n");

        let extractor = MetadataExtractor::new(ExtractorRegistry::with_defaults(1024));
        let record = extractor.extract(&path, &meta);

        assert_eq!(record.extension(), "txt");
        assert_eq!(record.content, "meeting notes");
        assert_eq!(record.size, 16);
        assert_ne!(record.modified_at, epoch());
    }

    #[test]
    fn test_plain_text_respects_limit() {
        let tmp = TempDir::new().unwrap();
        let (path, _) = write(&tmp, "big.log", "abcdefghij");

        let text = PlainTextExtractor::new(4).extract(&path).unwrap();
        assert_eq!(text, "abcd");
    }

    #[test]
    fn test_unregistered_extension_has_empty_content() {
        let tmp = TempDir::new().unwrap();
        let (path, meta) = write(&tmp, "image.png", "not really a png");

        let extractor = MetadataExtractor::new(ExtractorRegistry::with_defaults(1024));
        let record = extractor.extract(&path, &meta);

        assert!(record.content.is_empty());
        assert_eq!(record.size, 16);
    }

    #[test]
    fn test_failing_extractor_keeps_record() {
        let tmp = TempDir::new().unwrap();
        let (path, meta) = write(&tmp, "report.docx", "garbage");

        let mut registry = ExtractorRegistry::new();
        registry.register(".DOCX", Arc::new(FailingExtractor));
        let record = MetadataExtractor::new(registry).extract(&path, &meta);

        assert_eq!(record.name(), "report.docx");
        assert_eq!(record.size, 7);
        assert_eq!(record.content, "");
    }

    #[test]
    fn test_platform_failures_degrade() {
        let tmp = TempDir::new().unwrap();
        let (path, meta) = write(&tmp, "a.bin", "x");

        let record = MetadataExtractor::new(ExtractorRegistry::new())
            .with_time_source(Arc::new(BrokenClock))
            .with_attribute_source(Arc::new(BrokenAttributes))
            .extract(&path, &meta);

        assert_eq!(record.created_at, epoch());
        assert_eq!(record.modified_at, epoch());
        assert_eq!(record.accessed_at, epoch());
        assert!(!record.hidden);
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_content_is_never_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pipe.log");
        let status = std::process::Command::new("mkfifo")
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success());
        let meta = std::fs::metadata(&path).unwrap();

        assert!(PlainTextExtractor::new(1024).extract(&path).is_err());

        let record = MetadataExtractor::new(ExtractorRegistry::with_defaults(1024))
            .extract(&path, &meta);
        assert_eq!(record.name(), "pipe.log");
        assert!(record.content.is_empty());
    }

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = ExtractorRegistry::with_defaults(10);
        assert!(registry.get("MD").is_some());
        assert!(registry.get("pptx").is_none());
        assert_eq!(registry.len(), PLAIN_TEXT_EXTENSIONS.len());
    }
}
