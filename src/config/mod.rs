//! Configuration management for Trawler.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`TRAWLER_*`)
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::Config;
