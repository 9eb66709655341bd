// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the VM DNS synchronizer.
//!
//! All metrics carry the `vm_dns_sync_` prefix.
//!
//! # Metrics Categories
//!
//! - **Cycle Metrics** - Count and time each reconciliation cycle by outcome
//! - **Decision Metrics** - Triage decisions and resulting zone changes
//! - **Apply Metrics** - Update batches by outcome, oversized labels skipped
//!
//! # Example
//!
//! ```rust,no_run
//! use vm_dns_sync::metrics::{gather_metrics, record_cycle};
//!
//! record_cycle("success", std::time::Duration::from_secs(1));
//! let text = gather_metrics().unwrap();
//! ```

use std::net::SocketAddr;
use std::sync::LazyLock;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use tracing::{error, info};

use crate::constants::METRICS_SERVER_PATH;
use crate::model::{ChangeAction, Decision};

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "vm_dns_sync";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Cycle Metrics
// ============================================================================

/// Total number of reconciliation cycles by outcome
///
/// Labels:
/// - `outcome`: `success` or the error reason (e.g. `DryRun`, `PartialApplyFailure`)
pub static CYCLES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_cycles_total"),
        "Total number of reconciliation cycles by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliation cycles in seconds
pub static CYCLE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_cycle_duration_seconds"),
        "Duration of reconciliation cycles in seconds by outcome",
    )
    .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]);
    let histogram = HistogramVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Decision Metrics
// ============================================================================

/// Total number of triage decisions by kind
///
/// Labels:
/// - `decision`: `no_change`, `add`, `update`, `delete`
pub static DECISIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_decisions_total"),
        "Total number of triage decisions by kind",
    );
    let counter = CounterVec::new(opts, &["decision"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of zone changes computed by action
///
/// Labels:
/// - `action`: `UPSERT` or `DELETE`
pub static PENDING_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_pending_changes_total"),
        "Total number of zone changes computed by action",
    );
    let counter = CounterVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Apply Metrics
// ============================================================================

/// Total number of update batches by outcome
///
/// Labels:
/// - `status`: `success` or `error`
pub static BATCHES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_batches_total"),
        "Total number of zone update batches by outcome",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of hostnames skipped because a label was too long
pub static LABELS_SKIPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_oversized_labels_skipped_total"),
        "Total number of hostnames skipped because their leftmost label is too long",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a finished cycle
///
/// # Arguments
/// * `outcome` - `success` or the error reason
/// * `duration` - Wall time of the cycle
pub fn record_cycle(outcome: &str, duration: Duration) {
    CYCLES_TOTAL.with_label_values(&[outcome]).inc();
    CYCLE_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

/// Record a triage decision
pub fn record_decision(decision: Decision) {
    DECISIONS_TOTAL
        .with_label_values(&[decision.as_str()])
        .inc();
}

/// Record a computed zone change
pub fn record_pending_change(action: ChangeAction) {
    PENDING_CHANGES_TOTAL
        .with_label_values(&[action.as_str()])
        .inc();
}

/// Record an update batch outcome
pub fn record_batch(success: bool) {
    let status = if success { "success" } else { "error" };
    BATCHES_TOTAL.with_label_values(&[status]).inc();
}

/// Record a hostname skipped for an oversized label
pub fn record_label_skipped() {
    LABELS_SKIPPED_TOTAL.inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

async fn metrics_handler() -> (StatusCode, String) {
    match gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Serve `/metrics` until the task is dropped.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}{}", addr, METRICS_SERVER_PATH);
    axum::serve(listener, app).await?;
    Ok(())
}
