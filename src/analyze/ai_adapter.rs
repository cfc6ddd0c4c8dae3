// src/analyze/ai_adapter.rs
//! Analyzer adapters: text recognition, cheap text classification and expensive
//! vision classification behind async traits, with OpenAI-backed providers,
//! fixed-reply providers for local runs, and a disabled cheap path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;

use super::{CapturedFrame, ImageData, RecognizedFrame};
use crate::error::ProviderError;
use crate::model::ProductAnalysis;
use crate::text::{clamp01, sanitize_field};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Cheap, local text extraction over the captured frames.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, frames: &[CapturedFrame]) -> Result<Vec<RecognizedFrame>, ProviderError>;
    fn name(&self) -> &'static str;
}

/// Result of the cheap text classifier: the analysis and the classifier's own
/// confidence in it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextClassification {
    pub analysis: ProductAnalysis,
    pub confidence: f32,
}

/// Low-cost structured extraction from recognized label text.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify_text(&self, text: &str) -> Result<TextClassification, ProviderError>;
    fn name(&self) -> &'static str;
}

/// Higher-cost structured extraction straight from an image.
#[async_trait]
pub trait VisionClassifier: Send + Sync {
    async fn classify_image(&self, image: &ImageData) -> Result<ProductAnalysis, ProviderError>;
    fn name(&self) -> &'static str;
}

pub type DynTextRecognizer = Arc<dyn TextRecognizer>;
pub type DynTextClassifier = Arc<dyn TextClassifier>;
pub type DynVisionClassifier = Arc<dyn VisionClassifier>;

/// Factory: build the classifier pair according to environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns fixed-reply classifiers.
/// * Else builds the OpenAI providers (`OPENAI_API_KEY`); the cheap one is replaced
///   by `DisabledTextClassifier` when `cheap_enabled` is false.
pub fn build_classifiers(
    cheap_enabled: bool,
) -> Result<(DynTextClassifier, DynVisionClassifier), ProviderError> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let fixed = ProductAnalysis::new("Hand Sanitizer", 0.9)
            .with_brand("Purell")
            .with_form("gel");
        let text: DynTextClassifier = if cheap_enabled {
            Arc::new(StaticTextClassifier::new(fixed.clone(), 0.9))
        } else {
            Arc::new(DisabledTextClassifier)
        };
        return Ok((text, Arc::new(StaticVisionClassifier::new(fixed))));
    }

    let vision = OpenAiVisionClassifier::new(None)?;
    let text: DynTextClassifier = if cheap_enabled {
        Arc::new(OpenAiTextClassifier::new(None)?)
    } else {
        Arc::new(DisabledTextClassifier)
    };
    Ok((text, Arc::new(vision)))
}

// ------------------------------------------------------------
// Client-side OCR pass-through
// ------------------------------------------------------------

/// Uses the text the phone's on-device OCR attached to each frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientOcrRecognizer;

#[async_trait]
impl TextRecognizer for ClientOcrRecognizer {
    async fn recognize(&self, frames: &[CapturedFrame]) -> Result<Vec<RecognizedFrame>, ProviderError> {
        Ok(frames
            .iter()
            .enumerate()
            .filter_map(|(frame_index, f)| {
                let text = f.text.as_deref()?.trim();
                (!text.is_empty()).then(|| RecognizedFrame {
                    frame_index,
                    text: text.to_string(),
                    confidence: clamp01(f.text_confidence.unwrap_or(0.5)),
                })
            })
            .collect())
    }
    fn name(&self) -> &'static str {
        "client_ocr"
    }
}

// ------------------------------------------------------------
// OpenAI providers (Chat Completions, JSON mode)
// ------------------------------------------------------------

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = "You identify personal-care and beauty products. Reply with ONE JSON object: \
{\"product_type\": string, \"brand\": string|null, \"form\": string|null, \"ingredients\": [string], \
\"confidence\": number 0..1}. product_type is a short generic noun phrase such as \"Hand Sanitizer\" or \
\"Body Lotion\". form is one word such as gel, cream, lotion, oil, spray, foam, bar, powder, wipe. \
No prose.";

/// Shared HTTP plumbing for both OpenAI classifiers.
struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiClient {
    fn new(model: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("scan-matcher/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: model.to_string(),
            endpoint: OPENAI_CHAT_URL.to_string(),
        })
    }

    async fn complete(&self, user_content: serde_json::Value, max_tokens: u32) -> Result<ModelReply, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_content },
            ],
            "temperature": 0.0,
            "max_tokens": max_tokens,
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("empty completion".into()))?;
        parse_model_reply(&content)
    }
}

/// JSON object the model is asked to produce.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelReply {
    pub product_type: String,
    pub brand: Option<String>,
    pub form: Option<String>,
    pub ingredients: Vec<String>,
    pub confidence: f32,
}

impl ModelReply {
    /// Sanitized `ProductAnalysis` (ASCII, single line, capped fields).
    pub fn into_analysis(self, raw_text: &str) -> ProductAnalysis {
        let opt = |v: Option<String>| v.map(|s| sanitize_field(&s)).filter(|s| !s.is_empty());
        ProductAnalysis {
            product_type: sanitize_field(&self.product_type),
            brand: opt(self.brand),
            form: opt(self.form).map(|f| f.to_lowercase()),
            ingredients: self
                .ingredients
                .iter()
                .map(|i| sanitize_field(i))
                .filter(|i| !i.is_empty())
                .collect(),
            confidence: clamp01(self.confidence),
            raw_text: raw_text.to_string(),
        }
    }
}

/// Parse the model's JSON content, tolerating a fenced code block around it.
pub fn parse_model_reply(content: &str) -> Result<ModelReply, ProviderError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```").trim())
        .unwrap_or(trimmed);
    let reply: ModelReply =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if sanitize_field(&reply.product_type).is_empty() {
        return Err(ProviderError::Malformed("missing product_type".into()));
    }
    Ok(reply)
}

/// Cheap path: classifies recognized label text. Requires `OPENAI_API_KEY`.
pub struct OpenAiTextClassifier {
    client: OpenAiClient,
}

impl OpenAiTextClassifier {
    /// `model_override`: pass Some("gpt-4o") to override; defaults to gpt-4o-mini.
    pub fn new(model_override: Option<&str>) -> Result<Self, ProviderError> {
        let model = model_override.unwrap_or("gpt-4o-mini");
        Ok(Self {
            client: OpenAiClient::new(model, Duration::from_secs(10))?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.client.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TextClassifier for OpenAiTextClassifier {
    async fn classify_text(&self, text: &str) -> Result<TextClassification, ProviderError> {
        let prompt = format!("Label text read from the product:\n{text}");
        let reply = self.client.complete(json!(prompt), 200).await?;
        let confidence = clamp01(reply.confidence);
        Ok(TextClassification {
            analysis: reply.into_analysis(text),
            confidence,
        })
    }
    fn name(&self) -> &'static str {
        "openai_text"
    }
}

/// Expensive path: classifies the image itself. Requires `OPENAI_API_KEY`.
pub struct OpenAiVisionClassifier {
    client: OpenAiClient,
}

impl OpenAiVisionClassifier {
    /// `model_override`: defaults to gpt-4o.
    pub fn new(model_override: Option<&str>) -> Result<Self, ProviderError> {
        let model = model_override.unwrap_or("gpt-4o");
        Ok(Self {
            client: OpenAiClient::new(model, Duration::from_secs(30))?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.client.endpoint = endpoint.into();
        self
    }
}

/// `data:` URL carrying the image inline.
pub fn data_url(image: &ImageData) -> String {
    format!("data:{};base64,{}", image.mime, STANDARD.encode(&image.bytes))
}

#[async_trait]
impl VisionClassifier for OpenAiVisionClassifier {
    async fn classify_image(&self, image: &ImageData) -> Result<ProductAnalysis, ProviderError> {
        if image.bytes.is_empty() {
            return Err(ProviderError::Unavailable("empty image".into()));
        }
        let content = json!([
            { "type": "text", "text": "Identify the product in this photo." },
            { "type": "image_url", "image_url": { "url": data_url(image), "detail": "low" } },
        ]);
        let reply = self.client.complete(content, 300).await?;
        Ok(reply.into_analysis(""))
    }
    fn name(&self) -> &'static str {
        "openai_vision"
    }
}

// ------------------------------------------------------------
// Fixed-reply and disabled providers
// ------------------------------------------------------------

/// Always returns the same classification; for tests/local runs.
#[derive(Debug, Clone)]
pub struct StaticTextClassifier {
    pub fixed: ProductAnalysis,
    pub confidence: f32,
}

impl StaticTextClassifier {
    pub fn new(fixed: ProductAnalysis, confidence: f32) -> Self {
        Self {
            fixed,
            confidence: clamp01(confidence),
        }
    }
}

#[async_trait]
impl TextClassifier for StaticTextClassifier {
    async fn classify_text(&self, text: &str) -> Result<TextClassification, ProviderError> {
        Ok(TextClassification {
            analysis: self.fixed.clone().with_raw_text(text),
            confidence: self.confidence,
        })
    }
    fn name(&self) -> &'static str {
        "static_text"
    }
}

/// Always returns the same analysis; for tests/local runs.
#[derive(Debug, Clone)]
pub struct StaticVisionClassifier {
    pub fixed: ProductAnalysis,
}

impl StaticVisionClassifier {
    pub fn new(fixed: ProductAnalysis) -> Self {
        Self { fixed }
    }
}

#[async_trait]
impl VisionClassifier for StaticVisionClassifier {
    async fn classify_image(&self, _image: &ImageData) -> Result<ProductAnalysis, ProviderError> {
        Ok(self.fixed.clone())
    }
    fn name(&self) -> &'static str {
        "static_vision"
    }
}

/// Always fails; used when the cheap path is switched off so every scan goes to vision.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTextClassifier;

#[async_trait]
impl TextClassifier for DisabledTextClassifier {
    async fn classify_text(&self, _text: &str) -> Result<TextClassification, ProviderError> {
        Err(ProviderError::Unavailable("cheap path disabled".into()))
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: Option<&str>, conf: Option<f32>) -> CapturedFrame {
        CapturedFrame {
            image: ImageData::new(vec![1, 2, 3], "image/jpeg"),
            text: text.map(String::from),
            text_confidence: conf,
        }
    }

    #[test]
    fn reply_parses_with_or_without_fence() {
        let plain = r#"{"product_type":"Body Lotion","form":"Lotion","confidence":0.82}"#;
        let fenced = format!("```json\n{plain}\n```");
        for body in [plain.to_string(), fenced] {
            let r = parse_model_reply(&body).unwrap();
            assert_eq!(r.product_type, "Body Lotion");
            assert!((r.confidence - 0.82).abs() < 1e-6);
        }
    }

    #[test]
    fn reply_without_type_is_malformed() {
        let err = parse_model_reply(r#"{"brand":"Dove"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
        assert!(parse_model_reply("not json").is_err());
    }

    #[test]
    fn analysis_fields_are_sanitized() {
        let reply = ModelReply {
            product_type: "Hand\nSanitizer™".into(),
            brand: Some("  ".into()),
            form: Some("GEL".into()),
            ingredients: vec!["Alcohol".into(), "".into()],
            confidence: 4.0,
        };
        let a = reply.into_analysis("purell 8 fl oz");
        assert_eq!(a.product_type, "Hand Sanitizer");
        assert_eq!(a.brand, None);
        assert_eq!(a.form.as_deref(), Some("gel"));
        assert_eq!(a.ingredients, vec!["Alcohol".to_string()]);
        assert!((a.confidence - 1.0).abs() < 1e-6);
        assert_eq!(a.raw_text, "purell 8 fl oz");
    }

    #[test]
    fn data_url_embeds_mime_and_base64() {
        let url = data_url(&ImageData::new(b"hi".to_vec(), "image/png"));
        assert_eq!(url, "data:image/png;base64,aGk=");
    }

    #[tokio::test]
    async fn client_ocr_passes_through_frame_text() {
        let frames = vec![
            frame(Some(" Purell Hand Sanitizer "), Some(0.9)),
            frame(None, None),
            frame(Some("8 fl oz"), None),
        ];
        let out = ClientOcrRecognizer.recognize(&frames).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "Purell Hand Sanitizer");
        assert_eq!(out[1].frame_index, 2);
        assert!((out[1].confidence - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn missing_api_key_fails_without_network() {
        std::env::remove_var("OPENAI_API_KEY");
        let c = OpenAiTextClassifier::new(None).unwrap();
        let err = c.classify_text("hand sanitizer").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey));
    }

    #[tokio::test]
    async fn disabled_classifier_always_errors() {
        assert!(DisabledTextClassifier.classify_text("x").await.is_err());
    }
}
