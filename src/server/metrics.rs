//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Files in the last completed snapshot.
pub static FILES_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("trawler_files_total", "Number of files in the current snapshot").unwrap()
});

/// Crawl cycles by outcome.
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "trawler_cycles_total",
        "Total number of crawl cycles",
        &["outcome"]
    )
    .unwrap()
});

/// Wall time of a crawl cycle.
pub static CYCLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "trawler_cycle_duration_seconds",
        "Crawl cycle duration in seconds",
        vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]
    )
    .unwrap()
});

/// Discovery events published, by kind.
pub static EVENTS_PUBLISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "trawler_events_total",
        "Total number of discovery events published",
        &["kind"]
    )
    .unwrap()
});

/// Attached stream consumers.
pub static STREAM_SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "trawler_stream_subscribers",
        "Number of attached discovery stream consumers"
    )
    .unwrap()
});

/// Persistence sink failures, by operation.
pub static SINK_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "trawler_sink_failures_total",
        "Total number of failed persistence sink calls",
        &["operation"]
    )
    .unwrap()
});

/// Checksum batch requests served.
pub static CHECKSUM_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "trawler_checksum_requests_total",
        "Total number of checksum batch requests"
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*FILES_TOTAL;
    let _ = &*CYCLES_TOTAL;
    let _ = &*CYCLE_DURATION;
    let _ = &*EVENTS_PUBLISHED;
    let _ = &*STREAM_SUBSCRIBERS;
    let _ = &*SINK_FAILURES;
    let _ = &*CHECKSUM_REQUESTS;

    tracing::debug!("Prometheus metrics initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init() {
        init_metrics();

        FILES_TOTAL.set(100);
        assert_eq!(FILES_TOTAL.get(), 100);

        let before = CYCLES_TOTAL.with_label_values(&["completed"]).get();
        CYCLES_TOTAL.with_label_values(&["completed"]).inc();
        assert!(CYCLES_TOTAL.with_label_values(&["completed"]).get() > before);
    }

    #[test]
    fn test_metrics_are_gathered() {
        init_metrics();
        CHECKSUM_REQUESTS.inc();

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "trawler_checksum_requests_total"));
    }
}
