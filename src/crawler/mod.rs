//! Continuous filesystem crawling.
//!
//! This module provides:
//! - Volume enumeration and lazy per-volume walks
//! - Metadata and content extraction
//! - Snapshot diffing against the previous cycle
//! - The discovery event publisher
//! - The checksum batch service

mod checksum;
mod cycle;
mod extract;
mod filter;
mod platform;
mod publisher;
mod snapshot;
mod volumes;
mod walker;

pub use checksum::{checksum_batch, checksum_file, checksum_paths};
pub use cycle::{
    Crawler, CrawlerConfig, CrawlerStats, CrawlerStatsSnapshot, CycleOutcome, CycleReport,
};
pub use extract::{
    ContentExtractor, ExtractorRegistry, MetadataExtractor, PlainTextExtractor,
    PLAIN_TEXT_EXTENSIONS,
};
pub use filter::PathFilter;
pub use platform::{
    AttributeSource, FileTimes, LinkStat, MetadataTimes, NativeAttributes, StatSource, TimeSource,
};
pub use publisher::{DiscoveryEvent, Publisher, Subscription};
pub use snapshot::{diff, ChangeSet, DiffPolicy, Snapshot, SnapshotCache};
pub use volumes::{collapse_nested, FixedVolumes, ProbedVolumes, VolumeEnumerator};
pub use walker::{classify, walk, Disposition, VolumeWalk, WalkEntry, WalkStats};
