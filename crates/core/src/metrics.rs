//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Processing runs (items by outcome, durations, completed runs)
//! - Remote processing service (errors by kind)
//! - Uploads (accepted and rejected files)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Processing
// =============================================================================

/// Items processed total by outcome.
pub static ITEMS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qform_items_processed_total", "Total items processed"),
        &["result"], // "succeeded", "failed", "skipped"
    )
    .unwrap()
});

/// Remote call duration in seconds.
pub static PROCESSING_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "qform_processing_duration_seconds",
            "Duration of remote processing calls",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["result"],
    )
    .unwrap()
});

/// Runs completed total.
pub static RUNS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("qform_runs_completed_total", "Total processing runs completed").unwrap()
});

// =============================================================================
// Remote service
// =============================================================================

/// Remote processing errors by kind.
pub static PROCESSING_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "qform_processing_errors_total",
            "Total remote processing errors",
        ),
        &["kind"], // "transport", "application", "invalid_response", "local_file"
    )
    .unwrap()
});

// =============================================================================
// Uploads
// =============================================================================

/// Upload attempts by result.
pub static UPLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qform_uploads_total", "Total upload attempts"),
        &["result"], // "accepted", "rejected"
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ITEMS_PROCESSED.clone()),
        Box::new(PROCESSING_DURATION.clone()),
        Box::new(RUNS_COMPLETED.clone()),
        Box::new(PROCESSING_ERRORS.clone()),
        Box::new(UPLOADS_TOTAL.clone()),
    ]
}
