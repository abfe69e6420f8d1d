// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the ingress DNS controller.
//!
//! All metrics carry the `ingressdns_` prefix and are registered in
//! [`METRICS_REGISTRY`], which the metrics server exposes on `/metrics`.
//!
//! # Metrics Categories
//!
//! - **Admission Metrics** - Webhook decisions per hook
//! - **DNS Change Metrics** - Outcome and latency of every provider change
//! - **Resync Metrics** - Outcome and duration of full resync passes
//!
//! # Example
//!
//! ```rust,no_run
//! use ingressdns::metrics::record_admission_review;
//!
//! record_admission_review("ingress-dns", true);
//! ```

use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

use crate::diff::ChangeAction;
use crate::dns_errors::Provider;

/// Namespace prefix for all controller metrics
const METRICS_NAMESPACE: &str = "ingressdns";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Admission Metrics
// ============================================================================

/// Total number of admission reviews answered
///
/// Labels:
/// - `hook`: Webhook that answered (`ingress-dns`, `delete-namespace`)
/// - `decision`: `allowed` or `denied`
pub static ADMISSION_REVIEWS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_admission_reviews_total"),
        "Total number of admission reviews by hook and decision",
    );
    let counter = CounterVec::new(opts, &["hook", "decision"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// DNS Change Metrics
// ============================================================================

/// Total number of DNS changes submitted to a provider
///
/// Labels:
/// - `provider`: `internal` or `external`
/// - `action`: `upsert` or `delete`
/// - `status`: `success` or `error`
pub static DNS_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dns_changes_total"),
        "Total number of DNS changes by provider, action and status",
    );
    let counter = CounterVec::new(opts, &["provider", "action", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of DNS changes in seconds, retries included
///
/// Labels:
/// - `provider`: `internal` or `external`
pub static DNS_CHANGE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_dns_change_duration_seconds"),
        "Duration of DNS changes in seconds by provider",
    )
    .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]);
    let histogram = HistogramVec::new(opts, &["provider"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Resync Metrics
// ============================================================================

/// Total number of full resync passes
///
/// Labels:
/// - `status`: `success` or `error`
pub static RESYNC_RUNS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resync_runs_total"),
        "Total number of full resync passes by status",
    );
    let counter = CounterVec::new(opts, &["status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of full resync passes in seconds
pub static RESYNC_DURATION_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_resync_duration_seconds"),
        "Duration of full resync passes in seconds",
    )
    .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]);
    let histogram = Histogram::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Helper Functions
// ============================================================================

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Record an answered admission review
///
/// # Arguments
/// * `hook` - Webhook that answered
/// * `allowed` - Whether the request was admitted
pub fn record_admission_review(hook: &str, allowed: bool) {
    let decision = if allowed { "allowed" } else { "denied" };
    ADMISSION_REVIEWS_TOTAL
        .with_label_values(&[hook, decision])
        .inc();
}

/// Record one DNS change submitted to a provider
pub fn record_dns_change(
    provider: Provider,
    action: ChangeAction,
    success: bool,
    duration: Duration,
) {
    DNS_CHANGES_TOTAL
        .with_label_values(&[provider.as_str(), action.as_str(), status_label(success)])
        .inc();
    DNS_CHANGE_DURATION_SECONDS
        .with_label_values(&[provider.as_str()])
        .observe(duration.as_secs_f64());
}

/// Record a finished resync pass
pub fn record_resync(success: bool, duration: Duration) {
    RESYNC_RUNS_TOTAL
        .with_label_values(&[status_label(success)])
        .inc();
    RESYNC_DURATION_SECONDS.observe(duration.as_secs_f64());
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
