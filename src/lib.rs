// src/lib.rs
// Public library surface for integration tests and the service binary.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod rank;
pub mod retrieve;
pub mod scoring;
pub mod size;
pub mod text;

// Analysis gateway (quality gate, cheap/expensive classifiers, frame accumulation)
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use analyze::ai_adapter;
pub use crate::api::router;
pub use crate::config::MatchConfig;
pub use crate::error::ScanError;
pub use crate::pipeline::{MatchOutcome, ScanPipeline, ScanReport};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` wins over the default filter;
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scan_matcher=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
