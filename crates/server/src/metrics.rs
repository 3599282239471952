//! Prometheus metrics for the Curiocity server.
//!
//! Exposes metrics for resource uploads, content deduplication, and sweeps.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics contain no tenant-specific data (no user IDs, names, or hashes),
//! but they do expose aggregate system usage. Restrict the endpoint to
//! authorized scraper IPs at the infrastructure level; do NOT expose
//! `/metrics` on public networks.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{self, Encoder, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Resource upload metrics
pub static RESOURCES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "curiocity_resources_uploaded_total",
        "Total number of resources attached to documents",
    )
    .expect("metric creation failed")
});

pub static RESOURCES_DEDUPLICATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "curiocity_resources_deduplicated_total",
        "Total number of uploads that hash-matched an existing content record",
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "curiocity_bytes_uploaded_total",
        "Total bytes stored (new content records only)",
    )
    .expect("metric creation failed")
});

pub static BYTES_DEDUPLICATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "curiocity_bytes_deduplicated_total",
        "Total bytes saved through deduplication",
    )
    .expect("metric creation failed")
});

// Account metrics
pub static DOCUMENTS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "curiocity_documents_created_total",
        "Total number of documents created",
    )
    .expect("metric creation failed")
});

pub static SESSIONS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "curiocity_sessions_created_total",
        "Total number of sessions opened via signup or login",
    )
    .expect("metric creation failed")
});

// Sweep metrics
pub static SWEEP_RESOURCES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "curiocity_sweep_resources_deleted_total",
        "Total number of unreferenced content records reclaimed by sweeps",
    )
    .expect("metric creation failed")
});

pub static SWEEP_BYTES_RECLAIMED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "curiocity_sweep_bytes_reclaimed_total",
        "Total bytes reclaimed from storage by sweeps",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
/// This allows safe use in integration tests or when embedding multiple routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(RESOURCES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RESOURCES_DEDUPLICATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_DEDUPLICATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DOCUMENTS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SESSIONS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_RESOURCES_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_BYTES_RECLAIMED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
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
