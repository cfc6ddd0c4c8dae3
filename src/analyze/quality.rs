// src/analyze/quality.rs
//! Quality heuristic for recognized label text: decides whether the cheap text
//! classifier is worth calling or the scan should go straight to vision.

use strsim::normalized_levenshtein;

use crate::config::{GatewayConfig, GateTables, Taxonomy};
use crate::size::SizeParser;
use crate::text::{self, has_root};

const LENGTH_WEIGHT: f32 = 0.40;
const KEYWORD_BONUS: f32 = 0.25;
const BRAND_BONUS: f32 = 0.20;
const SIZE_BONUS: f32 = 0.15;

/// Tokens shorter than this are too ambiguous to fuzzy-match against brands.
const MIN_BRAND_TOKEN: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct TextQuality {
    pub score: f32,
    pub chars: usize,
    pub words: usize,
    pub has_keyword: bool,
    pub has_brand: bool,
    pub has_size: bool,
}

#[derive(Debug, Clone)]
pub struct QualityScorer {
    keywords: Vec<String>,
    /// Brand names split into their fuzzy-matchable tokens.
    brands: Vec<Vec<String>>,
    brand_similarity: f64,
    min_text_chars: usize,
    threshold: f32,
    min_word_count: usize,
}

impl QualityScorer {
    pub fn new(cfg: &GatewayConfig, gates: &GateTables, taxonomy: &Taxonomy) -> Self {
        let mut keywords = gates.descriptors.clone();
        keywords.extend(cfg.category_keywords.iter().cloned());
        keywords.sort();
        keywords.dedup();

        let brands = taxonomy
            .brands
            .keys()
            .map(|b| {
                text::words(b)
                    .into_iter()
                    .filter(|t| t.chars().count() >= MIN_BRAND_TOKEN)
                    .collect::<Vec<_>>()
            })
            .filter(|tokens| !tokens.is_empty())
            .collect();

        Self {
            keywords,
            brands,
            brand_similarity: cfg.brand_similarity,
            min_text_chars: cfg.min_text_chars.max(1),
            threshold: cfg.quality_threshold,
            min_word_count: cfg.min_word_count,
        }
    }

    pub fn assess(&self, input: &str) -> TextQuality {
        let chars = input.trim().chars().count();
        let words = text::words(input);

        let has_keyword = self.keywords.iter().any(|k| has_root(&words, k));
        let has_brand = self.brand_present(&words);
        let has_size = SizeParser::has_size(input);

        let length = (chars as f32 / self.min_text_chars as f32).min(1.0);
        let mut score = LENGTH_WEIGHT * length;
        if has_keyword {
            score += KEYWORD_BONUS;
        }
        if has_brand {
            score += BRAND_BONUS;
        }
        if has_size {
            score += SIZE_BONUS;
        }

        TextQuality {
            score: text::clamp01(score),
            chars,
            words: words.len(),
            has_keyword,
            has_brand,
            has_size,
        }
    }

    /// Quality good enough to try the cheap classifier.
    pub fn passes(&self, q: &TextQuality) -> bool {
        q.score >= self.threshold && q.words >= self.min_word_count
    }

    // every token of some brand finds a close OCR token
    fn brand_present(&self, words: &[String]) -> bool {
        let tokens: Vec<&String> = words
            .iter()
            .filter(|w| w.chars().count() >= MIN_BRAND_TOKEN)
            .collect();
        if tokens.is_empty() {
            return false;
        }
        self.brands.iter().any(|brand| {
            brand.iter().all(|b| {
                tokens
                    .iter()
                    .any(|t| normalized_levenshtein(t, b) >= self.brand_similarity)
            })
        })
    }
}
