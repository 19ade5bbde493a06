//! Trawler - continuous incremental filesystem indexer
//!
//! Entry point for the Trawler service.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use trawler::crawler::{
    Crawler, CrawlerConfig, ExtractorRegistry, FixedVolumes, MetadataExtractor, ProbedVolumes,
    Publisher, VolumeEnumerator,
};
use trawler::server::{init_metrics, init_tracing, App, AppState, ServerConfig};
use trawler::storage::{init_storage, list_files, Database, SqliteSink};
use trawler::{Config, Result};

/// Trawler - continuous incremental filesystem indexer
#[derive(Parser, Debug)]
#[command(name = "trawler")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory for the `SQLite` catalog
    #[arg(short, long, env = "TRAWLER_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Host address to bind to
    #[arg(long, env = "TRAWLER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "TRAWLER_PORT", default_value = "8080")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TRAWLER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "TRAWLER_LOG_JSON")]
    log_json: bool,

    /// Volume roots to crawl (default: every mounted volume)
    #[arg(short, long, env = "TRAWLER_ROOTS", value_delimiter = ',')]
    root: Vec<PathBuf>,

    /// Gitignore-style patterns to skip
    #[arg(short, long, env = "TRAWLER_EXCLUDE", value_delimiter = ',')]
    exclude: Vec<String>,

    /// Seconds between crawl cycles
    #[arg(long, env = "TRAWLER_CYCLE_INTERVAL", default_value = "5")]
    cycle_interval: u64,

    /// Seconds a stream consumer may stall before being dropped
    #[arg(long, env = "TRAWLER_SEND_TIMEOUT", default_value = "30")]
    send_timeout: u64,

    /// Maximum bytes of content extracted per file
    #[arg(long, env = "TRAWLER_MAX_CONTENT_BYTES", default_value = "1048576")]
    max_content_bytes: u64,

    /// Report size/mtime changes of known files as updates
    #[arg(long, env = "TRAWLER_DETECT_MODIFIED")]
    detect_modified: bool,

    /// Events buffered per stream consumer
    #[arg(long, env = "TRAWLER_SUBSCRIBER_BUFFER", default_value = "64")]
    subscriber_buffer: usize,

    /// Records buffered between a volume walk and the crawl task
    #[arg(long, env = "TRAWLER_WALK_BUFFER", default_value = "256")]
    walk_buffer: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build config from CLI
    let config = Config {
        data_dir: cli.data_dir,
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
        log_json: cli.log_json,
        roots: cli.root,
        exclude: cli.exclude,
        cycle_interval_secs: cli.cycle_interval,
        send_timeout_secs: cli.send_timeout,
        max_content_bytes: cli.max_content_bytes,
        detect_modified: cli.detect_modified,
        subscriber_buffer: cli.subscriber_buffer,
        walk_buffer: cli.walk_buffer,
    };

    // Initialize tracing with configuration
    init_tracing(&config.log_level, config.log_json);

    tracing::info!("Trawler v{} starting...", env!("CARGO_PKG_VERSION"));
    tracing::debug!(?config, "Configuration loaded");

    // Validate config
    config.validate()?;

    tracing::info!(
        "Server will bind to {}, data in {:?}",
        config.server_addr(),
        config.data_dir
    );

    // Initialize database
    let db = Database::open(config.database_path())?;
    init_storage(&db)?;

    // Initialize metrics
    init_metrics();

    let volumes: Arc<dyn VolumeEnumerator> = if config.roots.is_empty() {
        tracing::info!("Crawling all mounted volumes");
        Arc::new(ProbedVolumes::platform())
    } else {
        tracing::info!(roots = ?config.roots, "Crawling configured roots");
        Arc::new(FixedVolumes::new(config.roots.clone()))
    };

    let publisher = Arc::new(Publisher::new(
        config.subscriber_buffer,
        config.send_timeout(),
    ));
    let extractor = MetadataExtractor::new(ExtractorRegistry::with_defaults(
        config.max_content_bytes,
    ));
    let crawler = Crawler::new(
        volumes,
        extractor,
        Arc::new(SqliteSink::new(db.clone())),
        Arc::clone(&publisher),
        CrawlerConfig::from(&config),
    )
    .with_known_files(db.with_conn(list_files)?);

    // Create and run server
    let server_config = ServerConfig {
        host: config.host,
        port: config.port,
        ..Default::default()
    };
    let state = AppState::new(db, publisher, crawler.cache(), crawler.stats());

    let app = App::new(server_config, state, crawler);
    app.run().await
}
