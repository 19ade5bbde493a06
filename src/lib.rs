//! Trawler
//!
//! Continuous incremental filesystem indexer. Walks every volume on a
//! fixed interval, diffs each pass against the last one, persists the
//! changes, and streams discovery events to connected consumers.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawler;
pub mod error;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
