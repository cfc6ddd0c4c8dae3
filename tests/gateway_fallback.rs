// tests/gateway_fallback.rs
//
// Analysis gateway routing with counting analyzers.
//
// Covered:
// - low-quality text never reaches the cheap classifier
// - low cheap confidence, cheap errors and cheap timeouts fall back to vision
// - vision failures and timeouts are terminal
// - multi-frame text merge, best-frame choice, cost accounting

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use scan_matcher::analyze::{
    AnalysisGateway, CapturedFrame, ClientOcrRecognizer, ImageData, RecognizedFrame,
    TextClassification, TextClassifier, TextRecognizer, VisionClassifier,
};
use scan_matcher::config::{GateTables, GatewayConfig, Taxonomy};
use scan_matcher::error::ProviderError;
use scan_matcher::model::{ProductAnalysis, ScanMethod};
use scan_matcher::ScanError;

const GOOD_TEXT: &str = "PURELL Advanced Hand Sanitizer Refreshing Gel 8 fl oz";
/// Length-only text: exactly the 0.40 length component, nothing else.
const PLAIN_TEXT: &str = "the quick brown fox jumps over lazy dogs";

#[derive(Clone, Copy)]
enum TextMode {
    Answer(f32),
    Fail,
    Hang,
}

struct CountingText {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<String>>>,
    mode: TextMode,
}

#[async_trait]
impl TextClassifier for CountingText {
    async fn classify_text(&self, text: &str) -> Result<TextClassification, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());
        match self.mode {
            TextMode::Answer(confidence) => Ok(TextClassification {
                analysis: ProductAnalysis::new("Hand Sanitizer", confidence).with_form("gel"),
                confidence,
            }),
            TextMode::Fail => Err(ProviderError::Status(500)),
            TextMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Unavailable("hung".into()))
            }
        }
    }
    fn name(&self) -> &'static str {
        "counting_text"
    }
}

#[derive(Clone, Copy)]
enum VisionMode {
    Answer,
    Fail,
    Hang,
}

struct CountingVision {
    calls: Arc<AtomicUsize>,
    images: Arc<Mutex<Vec<Vec<u8>>>>,
    mode: VisionMode,
}

#[async_trait]
impl VisionClassifier for CountingVision {
    async fn classify_image(&self, image: &ImageData) -> Result<ProductAnalysis, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.images.lock().unwrap().push(image.bytes.clone());
        match self.mode {
            VisionMode::Answer => Ok(ProductAnalysis::new("Hand Sanitizer", 0.95).with_brand("Purell")),
            VisionMode::Fail => Err(ProviderError::Malformed("no product_type".into())),
            VisionMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::Unavailable("hung".into()))
            }
        }
    }
    fn name(&self) -> &'static str {
        "counting_vision"
    }
}

struct BrokenRecognizer;

#[async_trait]
impl TextRecognizer for BrokenRecognizer {
    async fn recognize(&self, _frames: &[CapturedFrame]) -> Result<Vec<RecognizedFrame>, ProviderError> {
        Err(ProviderError::Unavailable("camera text unavailable".into()))
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

struct Harness {
    gateway: AnalysisGateway,
    text_calls: Arc<AtomicUsize>,
    vision_calls: Arc<AtomicUsize>,
    seen_text: Arc<Mutex<Vec<String>>>,
    seen_images: Arc<Mutex<Vec<Vec<u8>>>>,
}

fn harness_with(
    cfg: GatewayConfig,
    recognizer: Arc<dyn TextRecognizer>,
    text: TextMode,
    vision: VisionMode,
) -> Harness {
    let text_calls = Arc::new(AtomicUsize::new(0));
    let vision_calls = Arc::new(AtomicUsize::new(0));
    let seen_text = Arc::new(Mutex::new(Vec::new()));
    let seen_images = Arc::new(Mutex::new(Vec::new()));
    let gateway = AnalysisGateway::new(
        recognizer,
        Arc::new(CountingText {
            calls: text_calls.clone(),
            seen: seen_text.clone(),
            mode: text,
        }),
        Arc::new(CountingVision {
            calls: vision_calls.clone(),
            images: seen_images.clone(),
            mode: vision,
        }),
        cfg,
        &GateTables::default_seed(),
        &Taxonomy::default_seed(),
    );
    Harness {
        gateway,
        text_calls,
        vision_calls,
        seen_text,
        seen_images,
    }
}

fn harness(text: TextMode, vision: VisionMode) -> Harness {
    harness_with(GatewayConfig::default(), Arc::new(ClientOcrRecognizer), text, vision)
}

fn frame(byte: u8, text: &str, confidence: f32) -> CapturedFrame {
    CapturedFrame::image_only(ImageData::new(vec![byte], "image/jpeg")).with_text(text, confidence)
}

#[tokio::test]
async fn confident_cheap_answer_is_accepted() {
    let h = harness(TextMode::Answer(0.9), VisionMode::Answer);
    let out = h.gateway.analyze(&[frame(1, GOOD_TEXT, 0.8)]).await.expect("analyze");

    assert_eq!(out.method, ScanMethod::CheapText);
    assert_eq!(h.text_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.vision_calls.load(Ordering::SeqCst), 0);
    assert!((out.cost_usd - 0.0003).abs() < 1e-9);
    assert_eq!(out.analysis.raw_text, GOOD_TEXT, "raw text is filled from OCR");
}

#[tokio::test]
async fn low_quality_text_skips_the_cheap_classifier() {
    let h = harness(TextMode::Answer(0.9), VisionMode::Answer);
    let out = h.gateway.analyze(&[frame(1, PLAIN_TEXT, 0.8)]).await.expect("analyze");

    assert!((out.quality - 0.40).abs() < 1e-6, "quality was {}", out.quality);
    assert_eq!(out.method, ScanMethod::ExpensiveVision);
    assert_eq!(h.text_calls.load(Ordering::SeqCst), 0, "cheap path must not run");
    assert_eq!(h.vision_calls.load(Ordering::SeqCst), 1);
    assert!((out.cost_usd - 0.01).abs() < 1e-9, "only the vision call is billed");
}

#[tokio::test]
async fn unsure_cheap_answer_falls_back_to_vision() {
    let h = harness(TextMode::Answer(0.5), VisionMode::Answer);
    let out = h.gateway.analyze(&[frame(1, GOOD_TEXT, 0.8)]).await.expect("analyze");

    assert_eq!(out.method, ScanMethod::ExpensiveVision);
    assert_eq!(h.text_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.vision_calls.load(Ordering::SeqCst), 1);
    assert!((out.cost_usd - 0.0103).abs() < 1e-9, "both calls are billed, got {}", out.cost_usd);
    assert_eq!(out.analysis.brand.as_deref(), Some("Purell"));
}

#[tokio::test]
async fn cheap_failure_falls_back_to_vision() {
    let h = harness(TextMode::Fail, VisionMode::Answer);
    let out = h.gateway.analyze(&[frame(1, GOOD_TEXT, 0.8)]).await.expect("analyze");
    assert_eq!(out.method, ScanMethod::ExpensiveVision);
    assert_eq!(h.vision_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn cheap_timeout_falls_back_to_vision() {
    let h = harness(TextMode::Hang, VisionMode::Answer);
    let out = h.gateway.analyze(&[frame(1, GOOD_TEXT, 0.8)]).await.expect("analyze");
    assert_eq!(out.method, ScanMethod::ExpensiveVision);
    assert_eq!(h.text_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.vision_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn vision_failure_is_analysis_rejected() {
    let h = harness(TextMode::Answer(0.9), VisionMode::Fail);
    let err = h
        .gateway
        .analyze(&[frame(1, PLAIN_TEXT, 0.8)])
        .await
        .expect_err("vision failure is terminal");
    assert!(matches!(err, ScanError::AnalysisRejected(_)), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn vision_timeout_is_analysis_timeout() {
    let h = harness(TextMode::Answer(0.9), VisionMode::Hang);
    let err = h
        .gateway
        .analyze(&[frame(1, PLAIN_TEXT, 0.8)])
        .await
        .expect_err("vision timeout is terminal");
    assert_eq!(err, ScanError::AnalysisTimeout);
}

#[tokio::test]
async fn no_frames_is_rejected_without_calls() {
    let h = harness(TextMode::Answer(0.9), VisionMode::Answer);
    let err = h.gateway.analyze(&[]).await.expect_err("nothing to analyze");
    assert!(matches!(err, ScanError::AnalysisRejected(_)));
    assert_eq!(h.text_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.vision_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fragments_from_several_frames_are_merged() {
    let h = harness(TextMode::Answer(0.9), VisionMode::Answer);
    let frames = vec![
        frame(1, "PURELL Advanced Hand", 0.7),
        frame(2, "Sanitizer Gel 8 fl oz", 0.7),
        frame(3, "purell advanced hand", 0.6),
    ];
    let out = h.gateway.analyze(&frames).await.expect("analyze");

    assert_eq!(out.method, ScanMethod::CheapText);
    let seen = h.seen_text.lock().unwrap().clone();
    assert_eq!(seen, vec!["PURELL Advanced Hand Sanitizer Gel 8 fl oz".to_string()]);
}

#[tokio::test]
async fn vision_gets_the_most_confident_frame() {
    let h = harness(TextMode::Answer(0.9), VisionMode::Answer);
    let frames = vec![
        frame(1, "blurry", 0.3),
        frame(2, "smudge", 0.9),
        frame(3, "glare", 0.5),
    ];
    h.gateway.analyze(&frames).await.expect("analyze");
    assert_eq!(*h.seen_images.lock().unwrap(), vec![vec![2u8]]);
}

#[tokio::test]
async fn recognizer_failure_still_scans_with_vision() {
    let h = harness_with(
        GatewayConfig::default(),
        Arc::new(BrokenRecognizer),
        TextMode::Answer(0.9),
        VisionMode::Answer,
    );
    let out = h.gateway.analyze(&[frame(7, GOOD_TEXT, 0.8)]).await.expect("analyze");
    assert_eq!(out.method, ScanMethod::ExpensiveVision);
    assert_eq!(h.text_calls.load(Ordering::SeqCst), 0);
    assert_eq!(*h.seen_images.lock().unwrap(), vec![vec![7u8]]);
}

#[tokio::test]
async fn disabled_cheap_path_goes_straight_to_vision() {
    let cfg = GatewayConfig {
        cheap_path_enabled: false,
        ..GatewayConfig::default()
    };
    let h = harness_with(cfg, Arc::new(ClientOcrRecognizer), TextMode::Answer(0.9), VisionMode::Answer);
    let out = h.gateway.analyze(&[frame(1, GOOD_TEXT, 0.8)]).await.expect("analyze");
    assert_eq!(out.method, ScanMethod::ExpensiveVision);
    assert_eq!(h.text_calls.load(Ordering::SeqCst), 0);
}
