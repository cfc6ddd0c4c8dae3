// src/metrics.rs
//! Prometheus recorder, metric descriptions and the `/metrics` route.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once per process) and describe the scan series.
    pub fn init() -> anyhow::Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = HANDLE
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {}", e))?
            .clone();
        describe_metrics();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scan_total", "Scans that produced a report, by analysis method.");
        describe_counter!("scan_outcome_total", "Scan reports by match outcome.");
        describe_counter!("scan_failed_total", "Failed scans by cause tag.");
        describe_counter!(
            "scan_fallback_total",
            "Scans routed to the vision classifier, by reason."
        );
        describe_counter!("gate_excluded_total", "Candidates excluded, by gate.");
        describe_counter!("search_cache_total", "Search cache lookups, by hit/miss.");
        describe_histogram!("scan_duration_ms", "End-to-end scan time in milliseconds.");
        describe_histogram!("scan_cost_usd", "Estimated analyzer spend per scan in USD.");
    });
}
