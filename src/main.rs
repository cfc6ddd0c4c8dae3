// src/main.rs
//! Scan-to-match service binary entrypoint.
//! Boots the Axum HTTP server: loads config, wires the pipeline, mounts routes.

use scan_matcher::{
    api::{self, AppState},
    metrics::Metrics,
    MatchConfig, ScanPipeline,
};
use shuttle_axum::ShuttleAxum;
use tracing::info;

/// `/metrics` is mounted unless SCAN_METRICS=0.
fn metrics_enabled() -> bool {
    std::env::var("SCAN_METRICS")
        .map(|v| v.trim() != "0")
        .unwrap_or(true)
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    // This enables OPENAI_API_KEY / TYPESENSE_* / SCAN_* from .env.
    let _ = dotenvy::dotenv();

    scan_matcher::init_tracing();

    let cfg = MatchConfig::load_or_default();
    let pipeline = ScanPipeline::from_env(&cfg)?;
    info!(
        scorer = pipeline.scorer_name(),
        candidate_cap = pipeline.candidate_cap(),
        top_k = pipeline.top_k(),
        "scan pipeline ready"
    );

    let state = AppState::new(pipeline);
    let router = if metrics_enabled() {
        let metrics = Metrics::init()?;
        api::router_with_metrics(state, &metrics)
    } else {
        api::router(state)
    };

    Ok(router.into())
}
