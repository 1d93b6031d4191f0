//! Prometheus metrics for the depot server.
//!
//! Covers the hosted write path (uploads, rejections, reconciliations), the
//! proxy read path (hits, misses, cache fills) and request latency.
//!
//! The `/metrics` endpoint is unauthenticated so Prometheus can scrape it.
//! Restrict it at the network level when the repository is exposed publicly.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Write path
pub static ARTIFACTS_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_artifacts_uploaded_total",
        "Total number of artifacts stored and checksummed",
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_bytes_uploaded_total",
        "Total bytes accepted by PUT requests",
    )
    .expect("metric creation failed")
});

pub static UPLOADS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_uploads_rejected_total",
        "Total version uploads rejected by checksum validation",
    )
    .expect("metric creation failed")
});

pub static RECONCILIATIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_metadata_reconciliations_total",
        "Total version-index documents rebuilt",
    )
    .expect("metric creation failed")
});

// Proxy read path
pub static PROXY_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("depot_proxy_hits_total", "Total proxy reads served from cache")
        .expect("metric creation failed")
});

pub static PROXY_MISSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_proxy_misses_total",
        "Total proxy reads fetched from the remote",
    )
    .expect("metric creation failed")
});

pub static CACHE_FILLS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("depot_cache_fills_total", "Total cache fills by outcome"),
        &["outcome"],
    )
    .expect("metric creation failed")
});

// Timing
pub static REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "depot_request_duration_seconds",
            "Time taken to answer repository requests, by method",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(ARTIFACTS_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOADS_REJECTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RECONCILIATIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PROXY_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PROXY_MISSES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_FILLS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(REQUEST_DURATION.clone()))
            .expect("metric registration failed");
    });
}

/// Handler for the `/metrics` endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record how a detached cache fill ended.
pub fn record_cache_fill(outcome: &str) {
    CACHE_FILLS.with_label_values(&[outcome]).inc();
}
