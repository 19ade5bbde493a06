//! Error types and Result aliases for Trawler.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using Trawler's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Trawler operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database/storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Crawl error (walk, extraction, publishing).
    #[error("crawl error: {0}")]
    Crawl(#[from] CrawlError),

    /// Server/API error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `SQLite` database error.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("not found: {entity} with id '{id}'")]
    NotFound { entity: &'static str, id: String },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

/// Crawler errors.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Walking a volume failed with something other than a permission error.
    #[error("failed to walk '{root}': {reason}")]
    Walk { root: String, reason: String },

    /// A content extractor failed for one file.
    #[error("failed to extract '{path}': {reason}")]
    Extraction { path: String, reason: String },

    /// The walk was cancelled before it completed.
    #[error("crawl cancelled")]
    Cancelled,

    /// Background crawl task failed.
    #[error("crawl task failed: {0}")]
    Task(String),
}

/// Server/API errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Request handling error.
    #[error("request error: {0}")]
    Request(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl StorageError {
    /// Create a not-found error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl CrawlError {
    /// Create a volume walk error.
    pub fn walk(root: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Walk {
            root: root.into(),
            reason: reason.into(),
        }
    }

    /// Create an extraction error.
    pub fn extraction(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
