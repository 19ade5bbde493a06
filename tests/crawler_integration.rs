//! Integration tests for the crawl loop against the `SQLite` catalog.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use trawler::crawler::{
    Crawler, CrawlerConfig, CycleOutcome, DiffPolicy, ExtractorRegistry, FixedVolumes,
    MetadataExtractor, Publisher,
};
use trawler::storage::{
    count_files, get_file, init_storage, list_file_paths, list_files, Database, SqliteSink,
};

fn crawler_over(
    root: &std::path::Path,
    db: &Database,
    config: CrawlerConfig,
) -> (Crawler, Arc<Publisher>) {
    let publisher = Arc::new(Publisher::new(256, Duration::from_secs(5)));
    let crawler = Crawler::new(
        Arc::new(FixedVolumes::new(vec![root.to_path_buf()])),
        MetadataExtractor::new(ExtractorRegistry::with_defaults(64 * 1024)),
        Arc::new(SqliteSink::new(db.clone())),
        Arc::clone(&publisher),
        config,
    );
    (crawler, publisher)
}

/// Additions and deletions on disk end up in the catalog.
#[tokio::test]
async fn test_catalog_follows_filesystem() {
    let tmp = TempDir::new().unwrap();
    let volume = tmp.path().join("volume");
    fs::create_dir_all(volume.join("docs")).unwrap();
    fs::write(volume.join("docs/readme.md"), "# Title\n\nBody text").unwrap();
    fs::write(volume.join("photo.jpg"), [0xFFu8, 0xD8, 0xFF]).unwrap();

    let db = Database::open(tmp.path().join("catalog/trawler.db")).unwrap();
    init_storage(&db).unwrap();

    let (crawler, _publisher) = crawler_over(&volume, &db, CrawlerConfig::default());
    let cancel = CancellationToken::new();

    let report = crawler.run_cycle(&cancel).await;
    assert_eq!(report.outcome, CycleOutcome::Completed);
    assert_eq!(db.with_conn(count_files).unwrap(), 2);

    let readme = volume.join("docs/readme.md").to_string_lossy().to_string();
    let stored = db.with_conn(|conn| get_file(conn, &readme)).unwrap().unwrap();
    assert_eq!(stored.name(), "readme.md");
    assert_eq!(stored.extension(), "md");
    assert_eq!(stored.content, "# Title\n\nBody text");
    assert_eq!(stored.attributes, "Normal");

    let photo = volume.join("photo.jpg").to_string_lossy().to_string();
    let stored = db.with_conn(|conn| get_file(conn, &photo)).unwrap().unwrap();
    assert_eq!(stored.size, 3);
    assert!(stored.content.is_empty());

    fs::remove_file(volume.join("photo.jpg")).unwrap();
    fs::write(volume.join("notes.txt"), "new").unwrap();
    let report = crawler.run_cycle(&cancel).await;
    assert_eq!((report.added, report.removed), (1, 1));

    let mut paths = db.with_conn(list_file_paths).unwrap();
    paths.sort();
    let mut expected = vec![readme, volume.join("notes.txt").to_string_lossy().to_string()];
    expected.sort();
    assert_eq!(paths, expected);
}

/// A subscriber sees every file of each cycle and the removals.
#[tokio::test]
async fn test_subscriber_sees_cycle_events() {
    let tmp = TempDir::new().unwrap();
    let volume = tmp.path().join("volume");
    fs::create_dir_all(&volume).unwrap();
    fs::write(volume.join("a.txt"), "a").unwrap();
    fs::write(volume.join("b.txt"), "b").unwrap();

    let db = Database::open_in_memory().unwrap();
    init_storage(&db).unwrap();
    let (crawler, publisher) = crawler_over(&volume, &db, CrawlerConfig::default());
    let mut events = publisher.subscribe("integration");
    let cancel = CancellationToken::new();

    crawler.run_cycle(&cancel).await;
    fs::remove_file(volume.join("b.txt")).unwrap();
    crawler.run_cycle(&cancel).await;

    let mut kinds = Vec::new();
    while let Some(event) = events.try_recv() {
        kinds.push(event.kind());
    }
    let count = |k: &str| kinds.iter().filter(|&&x| x == k).count();

    assert_eq!(count("added"), 2);
    assert_eq!(count("present"), 1);
    assert_eq!(count("removed"), 1);
    assert_eq!(kinds.last(), Some(&"removed"));
}

/// Exclusion patterns keep matching subtrees out of the catalog.
#[tokio::test]
async fn test_excluded_paths_are_not_indexed() {
    let tmp = TempDir::new().unwrap();
    let volume = tmp.path().join("volume");
    fs::create_dir_all(volume.join("cache/blobs")).unwrap();
    fs::write(volume.join("cache/blobs/x.bin"), "x").unwrap();
    fs::write(volume.join("keep.txt"), "k").unwrap();

    let db = Database::open_in_memory().unwrap();
    init_storage(&db).unwrap();
    let config = CrawlerConfig {
        exclude: vec!["cache/".to_string()],
        ..CrawlerConfig::default()
    };
    let (crawler, _publisher) = crawler_over(&volume, &db, config);

    crawler.run_cycle(&CancellationToken::new()).await;

    assert_eq!(
        db.with_conn(list_file_paths).unwrap(),
        vec![volume.join("keep.txt").to_string_lossy().to_string()]
    );
}

/// Modified files are rewritten in place when detection is on.
#[tokio::test]
async fn test_detect_modified_updates_catalog() {
    let tmp = TempDir::new().unwrap();
    let volume = tmp.path().join("volume");
    fs::create_dir_all(&volume).unwrap();
    let log = volume.join("app.log");
    fs::write(&log, "line 1\n").unwrap();

    let db = Database::open_in_memory().unwrap();
    init_storage(&db).unwrap();
    let config = CrawlerConfig {
        policy: DiffPolicy::DetectModified,
        ..CrawlerConfig::default()
    };
    let (crawler, _publisher) = crawler_over(&volume, &db, config);
    let cancel = CancellationToken::new();

    crawler.run_cycle(&cancel).await;
    fs::write(&log, "line 1\nline 2\n").unwrap();
    let report = crawler.run_cycle(&cancel).await;

    assert_eq!(report.updated, 1);
    let key = log.to_string_lossy().to_string();
    let stored = db.with_conn(|conn| get_file(conn, &key)).unwrap().unwrap();
    assert_eq!(stored.content, "line 1\nline 2");
    assert_eq!(stored.size, 14);
}

/// Files deleted while the service was down leave the catalog on restart.
#[tokio::test]
async fn test_restart_reconciles_catalog() {
    let tmp = TempDir::new().unwrap();
    let volume = tmp.path().join("volume");
    fs::create_dir_all(&volume).unwrap();
    fs::write(volume.join("a.txt"), "a").unwrap();
    fs::write(volume.join("b.txt"), "b").unwrap();
    let db_path = tmp.path().join("catalog/trawler.db");
    let cancel = CancellationToken::new();

    {
        let db = Database::open(&db_path).unwrap();
        init_storage(&db).unwrap();
        let (crawler, _publisher) = crawler_over(&volume, &db, CrawlerConfig::default());
        crawler.run_cycle(&cancel).await;
        assert_eq!(db.with_conn(count_files).unwrap(), 2);
    }

    fs::remove_file(volume.join("b.txt")).unwrap();

    let db = Database::open(&db_path).unwrap();
    init_storage(&db).unwrap();
    let (crawler, publisher) = crawler_over(&volume, &db, CrawlerConfig::default());
    let crawler = crawler.with_known_files(db.with_conn(list_files).unwrap());
    let mut events = publisher.subscribe("restart");

    let report = crawler.run_cycle(&cancel).await;

    assert_eq!((report.added, report.removed), (0, 1));
    assert_eq!(
        db.with_conn(list_file_paths).unwrap(),
        vec![volume.join("a.txt").to_string_lossy().to_string()]
    );
    let mut kinds = Vec::new();
    while let Some(event) = events.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(kinds, vec!["present", "removed"]);
}
