// src/config/mod.rs
//! Matching configuration: thresholds, caps, scorer strategy and the gate and
//! taxonomy tables. Loaded from TOML (every field defaults), then sanitized and
//! optionally overridden from env.

pub mod gates;
pub mod taxonomy;

use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::warn;

pub use gates::{GateTables, UseCaseRule};
pub use taxonomy::{CategorySplit, Taxonomy, TypePattern};

pub const DEFAULT_MATCH_CONFIG_PATH: &str = "config/matching.toml";
pub const ENV_MATCH_CONFIG_PATH: &str = "SCAN_CONFIG_PATH";

pub const ENV_QUALITY_THRESHOLD: &str = "SCAN_QUALITY_THRESHOLD";
pub const ENV_CHEAP_CONFIDENCE: &str = "SCAN_CHEAP_CONFIDENCE";
pub const ENV_CANDIDATE_CAP: &str = "SCAN_CANDIDATE_CAP";
pub const ENV_TOP_K: &str = "SCAN_TOP_K";
pub const ENV_SCORER: &str = "SCAN_SCORER";

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

// parse optional positive integer env
fn parse_cap_env(raw: Option<String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|v| *v >= 1)
}

fn unit_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Quality score a recognized text needs before the cheap path is tried.
    pub quality_threshold: f32,
    pub min_word_count: usize,
    /// Text length at which the length component saturates.
    pub min_text_chars: usize,
    /// Minimum cheap-classifier confidence to accept its answer.
    pub cheap_confidence_threshold: f32,
    pub cheap_timeout_ms: u64,
    pub expensive_timeout_ms: u64,
    pub cheap_call_cost_usd: f64,
    pub expensive_call_cost_usd: f64,
    pub cheap_path_enabled: bool,
    /// Category words that count as a product keyword, on top of the gate descriptors.
    pub category_keywords: Vec<String>,
    pub brand_similarity: f64,
    pub frame_capacity: usize,
    pub frame_debounce_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.70,
            min_word_count: 5,
            min_text_chars: 30,
            cheap_confidence_threshold: 0.70,
            cheap_timeout_ms: 5_000,
            expensive_timeout_ms: 20_000,
            cheap_call_cost_usd: 0.0003,
            expensive_call_cost_usd: 0.0100,
            cheap_path_enabled: true,
            category_keywords: [
                "hair", "skin", "face", "facial", "body", "lip", "nail", "hand", "scalp", "curl",
                "beard", "moisturizing", "hydrating",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            brand_similarity: 0.85,
            frame_capacity: 8,
            frame_debounce_ms: 1_500,
        }
    }
}

impl GatewayConfig {
    pub fn cheap_timeout(&self) -> Duration {
        Duration::from_millis(self.cheap_timeout_ms)
    }
    pub fn expensive_timeout(&self) -> Duration {
        Duration::from_millis(self.expensive_timeout_ms)
    }
    pub fn frame_debounce(&self) -> Duration {
        Duration::from_millis(self.frame_debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub candidate_cap: usize,
    pub timeout_ms: u64,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_cap: 150,
            timeout_ms: 5_000,
            cache_enabled: true,
            cache_ttl_secs: 300,
            cache_capacity: 256,
        }
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub top_k: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { top_k: 20 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    PositionTrust,
    Tiered,
}

impl ScorerKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "position_trust" | "position" => Some(ScorerKind::PositionTrust),
            "tiered" => Some(ScorerKind::Tiered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TierWeights {
    pub product_type: f32,
    pub form: f32,
    pub brand_category: f32,
    pub ingredient_clarity: f32,
    pub size: f32,
    pub visual: f32,
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            product_type: 0.40,
            form: 0.25,
            brand_category: 0.15,
            ingredient_clarity: 0.10,
            size: 0.05,
            visual: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PositionWeights {
    pub name_weight: f32,
    pub position_weight: f32,
    /// Position falls from 1.0 to `1.0 - decay` over the candidate list.
    pub position_decay: f32,
    pub exact_form_bonus: f32,
    pub compatible_form_bonus: f32,
}

impl Default for PositionWeights {
    fn default() -> Self {
        Self {
            name_weight: 0.30,
            position_weight: 0.70,
            position_decay: 0.20,
            exact_form_bonus: 0.10,
            compatible_form_bonus: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub strategy: ScorerKind,
    pub tiered: TierWeights,
    pub position: PositionWeights,
    /// Sub-score needed for an "excellent" explanation label.
    pub explain_excellent: f32,
    /// Sub-score needed for a "good" explanation label.
    pub explain_good: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            strategy: ScorerKind::PositionTrust,
            tiered: TierWeights::default(),
            position: PositionWeights::default(),
            explain_excellent: 0.9,
            explain_good: 0.7,
        }
    }
}

/// Root of `config/matching.toml`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub gateway: GatewayConfig,
    pub retrieval: RetrievalConfig,
    pub ranking: RankingConfig,
    pub scoring: ScoringConfig,
    pub gates: GateTables,
    pub taxonomy: Taxonomy,
}

impl MatchConfig {
    /// Load from a TOML file. Uses SCAN_CONFIG_PATH or defaults to "config/matching.toml".
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_MATCH_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MATCH_CONFIG_PATH));

        let content = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read matching config at {}: {}",
                path.display(),
                e
            )
        })?;

        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Load from a TOML string. Sanitized, env not consulted.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut cfg: MatchConfig = toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid matching config: {}", e))?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// `from_toml`, or built-in defaults (still env-overridden) if the file is missing or bad.
    pub fn load_or_default() -> Self {
        match Self::from_toml() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "matching config unavailable, using built-in defaults");
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(t) = parse_threshold_env(std::env::var(ENV_QUALITY_THRESHOLD).ok()) {
            self.gateway.quality_threshold = t;
        }
        if let Some(t) = parse_threshold_env(std::env::var(ENV_CHEAP_CONFIDENCE).ok()) {
            self.gateway.cheap_confidence_threshold = t;
        }
        if let Some(cap) = parse_cap_env(std::env::var(ENV_CANDIDATE_CAP).ok()) {
            self.retrieval.candidate_cap = cap;
        }
        if let Some(k) = parse_cap_env(std::env::var(ENV_TOP_K).ok()) {
            self.ranking.top_k = k;
        }
        if let Ok(raw) = std::env::var(ENV_SCORER) {
            match ScorerKind::parse(&raw) {
                Some(kind) => self.scoring.strategy = kind,
                None => warn!(value = %raw, "unknown SCAN_SCORER, keeping configured scorer"),
            }
        }
    }

    /// Clamp thresholds, floor caps at 1, reset non-finite weights, clean tables.
    pub fn sanitize(&mut self) {
        let d = GatewayConfig::default();
        let g = &mut self.gateway;
        g.quality_threshold = unit_or(g.quality_threshold, d.quality_threshold);
        g.cheap_confidence_threshold =
            unit_or(g.cheap_confidence_threshold, d.cheap_confidence_threshold);
        g.min_text_chars = g.min_text_chars.max(1);
        g.frame_capacity = g.frame_capacity.max(1);
        if !g.brand_similarity.is_finite() || !(0.0..=1.0).contains(&g.brand_similarity) {
            g.brand_similarity = d.brand_similarity;
        }
        if !g.cheap_call_cost_usd.is_finite() || g.cheap_call_cost_usd < 0.0 {
            g.cheap_call_cost_usd = d.cheap_call_cost_usd;
        }
        if !g.expensive_call_cost_usd.is_finite() || g.expensive_call_cost_usd < 0.0 {
            g.expensive_call_cost_usd = d.expensive_call_cost_usd;
        }
        for k in g.category_keywords.iter_mut() {
            *k = k.trim().to_lowercase();
        }
        g.category_keywords.retain(|k| !k.is_empty());

        self.retrieval.candidate_cap = self.retrieval.candidate_cap.max(1);
        self.retrieval.cache_capacity = self.retrieval.cache_capacity.max(1);
        self.ranking.top_k = self.ranking.top_k.max(1);

        let s = &mut self.scoring;
        let dw = TierWeights::default();
        let w = &mut s.tiered;
        w.product_type = unit_or(w.product_type, dw.product_type);
        w.form = unit_or(w.form, dw.form);
        w.brand_category = unit_or(w.brand_category, dw.brand_category);
        w.ingredient_clarity = unit_or(w.ingredient_clarity, dw.ingredient_clarity);
        w.size = unit_or(w.size, dw.size);
        w.visual = unit_or(w.visual, dw.visual);

        let dp = PositionWeights::default();
        let p = &mut s.position;
        p.name_weight = unit_or(p.name_weight, dp.name_weight);
        p.position_weight = unit_or(p.position_weight, dp.position_weight);
        p.position_decay = unit_or(p.position_decay, dp.position_decay);
        p.exact_form_bonus = unit_or(p.exact_form_bonus, dp.exact_form_bonus);
        p.compatible_form_bonus = unit_or(p.compatible_form_bonus, dp.compatible_form_bonus);

        s.explain_excellent = unit_or(s.explain_excellent, 0.9);
        s.explain_good = unit_or(s.explain_good, 0.7);
        if s.explain_good > s.explain_excellent {
            // keep a valid band
            std::mem::swap(&mut s.explain_good, &mut s.explain_excellent);
        }

        self.gates.sanitize();
        self.taxonomy.sanitize();
    }
}
