// src/api.rs
//! HTTP surface: health, match and scan routes over a shared `ScanPipeline`.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::analyze::{CapturedFrame, ImageData};
use crate::error::ScanError;
use crate::metrics::Metrics;
use crate::model::{ProductAnalysis, ScanMethod};
use crate::pipeline::{ScanPipeline, ScanReport};

/// Upper bound on frames accepted per scan request.
pub const MAX_FRAMES: usize = 16;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ScanPipeline>,
}

impl AppState {
    pub fn new(pipeline: ScanPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/match", post(match_analysis))
        .route("/scan", post(scan))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `router` plus `/metrics`.
pub fn router_with_metrics(state: AppState, metrics: &Metrics) -> Router {
    router(state).merge(metrics.router())
}

#[derive(Deserialize)]
struct MatchReq {
    analysis: ProductAnalysis,
    #[serde(default)]
    method: Option<ScanMethod>,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Deserialize)]
struct FrameReq {
    image_base64: String,
    #[serde(default)]
    mime: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    text_confidence: Option<f32>,
}

#[derive(Deserialize)]
struct ScanReq {
    frames: Vec<FrameReq>,
    #[serde(default)]
    top_k: Option<usize>,
}

/// `ScanError` rendered as `{"error", "message", "hint"}` with a matching status.
pub struct ApiError(pub ScanError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ScanError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ScanError::AnalysisRejected(_) | ScanError::RetrievalFailure(_) => StatusCode::BAD_GATEWAY,
            ScanError::AnalysisTimeout => StatusCode::GATEWAY_TIMEOUT,
            ScanError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.0.cause_tag(),
            "message": self.0.to_string(),
            "hint": self.0.user_hint(),
        });
        (self.status(), Json(body)).into_response()
    }
}

fn effective_top_k(requested: Option<usize>, pipeline: &ScanPipeline) -> usize {
    requested.filter(|k| *k >= 1).unwrap_or(pipeline.top_k())
}

async fn match_analysis(
    State(state): State<AppState>,
    Json(body): Json<MatchReq>,
) -> Result<Json<ScanReport>, ApiError> {
    let top_k = effective_top_k(body.top_k, &state.pipeline);
    let method = body.method.unwrap_or(ScanMethod::CheapText);
    let report = state
        .pipeline
        .match_analysis_top_k(body.analysis, method, top_k)
        .await?;
    Ok(Json(report))
}

async fn scan(
    State(state): State<AppState>,
    Json(body): Json<ScanReq>,
) -> Result<Json<ScanReport>, ApiError> {
    if body.frames.is_empty() {
        return Err(ScanError::InvalidInput("no frames".into()).into());
    }
    if body.frames.len() > MAX_FRAMES {
        return Err(ScanError::InvalidInput(format!("at most {MAX_FRAMES} frames")).into());
    }
    let frames = body
        .frames
        .into_iter()
        .enumerate()
        .map(|(i, f)| decode_frame(f).map_err(|e| ScanError::InvalidInput(format!("frame {i}: {e}"))))
        .collect::<Result<Vec<_>, _>>()?;

    let top_k = effective_top_k(body.top_k, &state.pipeline);
    let report = state.pipeline.scan_top_k(&frames, top_k).await?;
    Ok(Json(report))
}

/// Accepts raw base64 or a `data:<mime>;base64,` URL.
fn decode_frame(f: FrameReq) -> Result<CapturedFrame, String> {
    let raw = f.image_base64.trim();
    let (url_mime, payload) = match raw.strip_prefix("data:").and_then(|r| r.split_once(";base64,")) {
        Some((mime, data)) => (Some(mime.to_string()), data),
        None => (None, raw),
    };
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| format!("invalid base64 image ({e})"))?;
    if bytes.is_empty() {
        return Err("empty image".into());
    }
    let mime = f
        .mime
        .or(url_mime)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "image/jpeg".to_string());
    Ok(CapturedFrame {
        image: ImageData::new(bytes, mime),
        text: f.text,
        text_confidence: f.text_confidence,
    })
}
