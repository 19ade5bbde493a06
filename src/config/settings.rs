//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the Trawler service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the `SQLite` catalog.
    pub data_dir: PathBuf,

    /// Host address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,

    /// Volume roots to crawl. Empty means probe the platform's volumes.
    pub roots: Vec<PathBuf>,

    /// Extra gitignore-style exclusion patterns.
    pub exclude: Vec<String>,

    /// Seconds to sleep between crawl cycles.
    pub cycle_interval_secs: u64,

    /// Seconds a stream consumer may stall before it is detached.
    pub send_timeout_secs: u64,

    /// Upper bound on bytes read by a content extractor.
    pub max_content_bytes: u64,

    /// Compare size and mtime of known files and emit updates.
    pub detect_modified: bool,

    /// Per-subscriber event buffer.
    pub subscriber_buffer: usize,

    /// Records buffered between a walk thread and the crawl task.
    pub walk_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_json: false,
            roots: Vec::new(),
            exclude: Vec::new(),
            cycle_interval_secs: 5,
            send_timeout_secs: 30,
            max_content_bytes: 1024 * 1024,
            detect_modified: false,
            subscriber_buffer: 64,
            walk_buffer: 256,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("port cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.host.is_empty() {
            return Err(Error::config("host cannot be empty"));
        }

        if self.cycle_interval_secs == 0 {
            return Err(Error::config("cycle_interval_secs cannot be 0"));
        }

        if self.send_timeout_secs == 0 {
            return Err(Error::config("send_timeout_secs cannot be 0"));
        }

        if self.subscriber_buffer == 0 || self.walk_buffer == 0 {
            return Err(Error::config(
                "subscriber_buffer and walk_buffer must be at least 1",
            ));
        }

        if let Some(root) = self.roots.iter().find(|r| !r.is_absolute()) {
            return Err(Error::config(format!(
                "volume root '{}' must be an absolute path",
                root.display()
            )));
        }

        crate::crawler::PathFilter::with_patterns("/", &self.exclude)?;

        Ok(())
    }

    /// Get the path to the `SQLite` catalog file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("trawler.db")
    }

    /// Get the server address as a string.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sleep between crawl cycles.
    #[must_use]
    pub const fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }

    /// Maximum stall of a stream consumer.
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}
