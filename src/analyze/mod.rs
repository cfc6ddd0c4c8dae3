// src/analyze/mod.rs
//! Analysis gateway: recognized frame text → quality gate → cheap text classifier,
//! falling back to the vision classifier on the best frame.
//!
//! The two paths are mutually exclusive per call and never run concurrently.

pub mod ai_adapter;
pub mod frames;
pub mod quality;

use std::time::{Duration, Instant};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{GateTables, GatewayConfig, Taxonomy};
use crate::error::ScanError;
use crate::model::{ProductAnalysis, ScanMethod};
use crate::text::anon_hash;

pub use ai_adapter::{
    ClientOcrRecognizer, DisabledTextClassifier, DynTextClassifier, DynTextRecognizer,
    DynVisionClassifier, StaticTextClassifier, StaticVisionClassifier, TextClassification,
    TextClassifier, TextRecognizer, VisionClassifier,
};
pub use frames::FrameAccumulator;
pub use quality::{QualityScorer, TextQuality};

/// Encoded image bytes as captured by the phone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }
}

/// One camera frame, optionally with text an on-device OCR pass already read.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub image: ImageData,
    pub text: Option<String>,
    pub text_confidence: Option<f32>,
}

impl CapturedFrame {
    pub fn image_only(image: ImageData) -> Self {
        Self {
            image,
            text: None,
            text_confidence: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>, confidence: f32) -> Self {
        self.text = Some(text.into());
        self.text_confidence = Some(confidence);
        self
    }
}

/// Text recognized in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedFrame {
    /// Index into the frames handed to the recognizer.
    pub frame_index: usize,
    pub text: String,
    pub confidence: f32,
}

/// The accepted analysis plus what it cost to get it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub analysis: ProductAnalysis,
    pub method: ScanMethod,
    /// Estimated dollars spent on the calls actually made.
    pub cost_usd: f64,
    pub elapsed: Duration,
    /// Quality score of the merged recognized text.
    pub quality: f32,
}

/// Why the cheap answer was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    Disabled,
    LowQuality,
    CheapError,
    CheapTimeout,
    LowConfidence,
}

impl Fallback {
    fn as_str(&self) -> &'static str {
        match self {
            Fallback::Disabled => "cheap_disabled",
            Fallback::LowQuality => "low_quality",
            Fallback::CheapError => "cheap_error",
            Fallback::CheapTimeout => "cheap_timeout",
            Fallback::LowConfidence => "low_confidence",
        }
    }
}

pub struct AnalysisGateway {
    recognizer: DynTextRecognizer,
    text: DynTextClassifier,
    vision: DynVisionClassifier,
    quality: QualityScorer,
    cfg: GatewayConfig,
}

impl AnalysisGateway {
    pub fn new(
        recognizer: DynTextRecognizer,
        text: DynTextClassifier,
        vision: DynVisionClassifier,
        cfg: GatewayConfig,
        gates: &GateTables,
        taxonomy: &Taxonomy,
    ) -> Self {
        let quality = QualityScorer::new(&cfg, gates, taxonomy);
        Self {
            recognizer,
            text,
            vision,
            quality,
            cfg,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.cfg
    }

    pub async fn analyze(&self, frames: &[CapturedFrame]) -> Result<AnalysisOutcome, ScanError> {
        if frames.is_empty() {
            return Err(ScanError::AnalysisRejected("no frames".into()));
        }
        let started = Instant::now();
        let mut cost_usd = 0.0;

        let recognized = match self.recognizer.recognize(frames).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, recognizer = self.recognizer.name(), "text recognition failed");
                Vec::new()
            }
        };
        let merged = self.merge(&recognized);
        let quality = self.quality.assess(&merged);
        let text_id = anon_hash(&merged);
        debug!(
            text_id = %text_id,
            chars = quality.chars,
            words = quality.words,
            quality = quality.score,
            "recognized text assessed"
        );

        let fallback = if !self.cfg.cheap_path_enabled {
            Fallback::Disabled
        } else if !self.quality.passes(&quality) {
            Fallback::LowQuality
        } else {
            cost_usd += self.cfg.cheap_call_cost_usd;
            match tokio::time::timeout(self.cfg.cheap_timeout(), self.text.classify_text(&merged)).await {
                Ok(Ok(c)) if c.confidence >= self.cfg.cheap_confidence_threshold => {
                    let mut analysis = c.analysis;
                    if analysis.raw_text.trim().is_empty() {
                        analysis.raw_text = merged;
                    }
                    let elapsed = started.elapsed();
                    info!(
                        text_id = %text_id,
                        method = ScanMethod::CheapText.as_str(),
                        confidence = c.confidence,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "analysis accepted"
                    );
                    return Ok(AnalysisOutcome {
                        analysis,
                        method: ScanMethod::CheapText,
                        cost_usd,
                        elapsed,
                        quality: quality.score,
                    });
                }
                Ok(Ok(c)) => {
                    debug!(confidence = c.confidence, "cheap classification below threshold");
                    Fallback::LowConfidence
                }
                Ok(Err(e)) => {
                    warn!(error = %e, classifier = self.text.name(), "cheap classifier failed");
                    Fallback::CheapError
                }
                Err(_) => {
                    warn!(timeout_ms = self.cfg.cheap_timeout_ms, "cheap classifier timed out");
                    Fallback::CheapTimeout
                }
            }
        };
        counter!("scan_fallback_total", "reason" => fallback.as_str()).increment(1);

        let best = best_frame(&recognized, frames.len());
        cost_usd += self.cfg.expensive_call_cost_usd;
        let analysis = match tokio::time::timeout(
            self.cfg.expensive_timeout(),
            self.vision.classify_image(&frames[best].image),
        )
        .await
        {
            Ok(Ok(mut a)) => {
                if a.raw_text.trim().is_empty() {
                    a.raw_text = merged;
                }
                a
            }
            Ok(Err(e)) => {
                warn!(error = %e, classifier = self.vision.name(), "vision classifier failed");
                return Err(ScanError::AnalysisRejected(e.to_string()));
            }
            Err(_) => {
                warn!(timeout_ms = self.cfg.expensive_timeout_ms, "vision classifier timed out");
                return Err(ScanError::AnalysisTimeout);
            }
        };

        let elapsed = started.elapsed();
        info!(
            text_id = %text_id,
            method = ScanMethod::ExpensiveVision.as_str(),
            fallback = fallback.as_str(),
            frame = best,
            elapsed_ms = elapsed.as_millis() as u64,
            "analysis accepted"
        );
        Ok(AnalysisOutcome {
            analysis,
            method: ScanMethod::ExpensiveVision,
            cost_usd,
            elapsed,
            quality: quality.score,
        })
    }

    fn merge(&self, recognized: &[RecognizedFrame]) -> String {
        let mut acc = FrameAccumulator::new(self.cfg.frame_capacity, self.cfg.frame_debounce());
        let now = Instant::now();
        for r in recognized {
            acc.push(&r.text, now);
        }
        acc.finalize()
    }
}

/// Frame with the highest recognizer confidence; the first frame when none was read.
fn best_frame(recognized: &[RecognizedFrame], frame_count: usize) -> usize {
    recognized
        .iter()
        .filter(|r| r.frame_index < frame_count)
        .fold(None::<&RecognizedFrame>, |best, r| match best {
            Some(b) if b.confidence >= r.confidence => Some(b),
            _ => Some(r),
        })
        .map(|r| r.frame_index)
        .unwrap_or(0)
}
