// src/model.rs
//! Data carried through the scan-to-match pipeline.
//!
//! `ProductAnalysis` is what an analyzer says it saw, `ScanClassification` is the
//! normalized form the matcher works on, `CatalogProduct` is a read-only catalog
//! entry, `ScoredMatch` is the transient response object.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::clamp01;

/// Structured output of a cheap-text or expensive-vision analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub product_type: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// Analyzer-reported confidence in <0.0, 1.0>.
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub raw_text: String,
}

impl ProductAnalysis {
    pub fn new(product_type: impl Into<String>, confidence: f32) -> Self {
        Self {
            product_type: product_type.into(),
            brand: None,
            form: None,
            ingredients: Vec::new(),
            confidence: clamp01(confidence),
            raw_text: String::new(),
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    pub fn with_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ingredients = ingredients.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_raw_text(mut self, raw: impl Into<String>) -> Self {
        self.raw_text = raw.into();
        self
    }
}

/// Which analyzer path produced a `ProductAnalysis`. Accounting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMethod {
    CheapText,
    ExpensiveVision,
}

impl ScanMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMethod::CheapText => "cheap_text",
            ScanMethod::ExpensiveVision => "expensive_vision",
        }
    }
}

/// A string value with the confidence it was extracted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    pub raw: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandInfo {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeUnit {
    Milliliter,
    Liter,
    FluidOunce,
    Gram,
    Kilogram,
    Ounce,
    Pound,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsedSize {
    pub value: f64,
    pub unit: SizeUnit,
}

/// Canonical, normalized description of what was scanned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanClassification {
    pub product_type: TypedValue,
    #[serde(default)]
    pub form: Option<TypedValue>,
    #[serde(default)]
    pub brand: Option<BrandInfo>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    pub ingredient_clarity: f32,
    #[serde(default)]
    pub size: Option<ParsedSize>,
    #[serde(default)]
    pub raw_text: String,
    pub timestamp: DateTime<Utc>,
}

impl ScanClassification {
    /// Form string, if one is known.
    pub fn form_raw(&self) -> Option<&str> {
        self.form.as_ref().map(|f| f.raw.as_str())
    }
}

/// A catalog entry as the search index returns it. Never mutated by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub main_category: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_bundle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
}

impl CatalogProduct {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            company: String::new(),
            price: 0.0,
            main_category: String::new(),
            product_type: String::new(),
            form: None,
            tags: Vec::new(),
            set_bundle: None,
            image_url: None,
            product_url: None,
        }
    }

    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    pub fn with_category(mut self, main_category: impl Into<String>) -> Self {
        self.main_category = main_category.into();
        self
    }

    pub fn with_product_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_type = product_type.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// One scored candidate. Transient: built per scan, dropped after the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub product_id: String,
    pub product: CatalogProduct,
    /// Match confidence in <0.0, 1.0>.
    pub confidence: f32,
    /// Per-tier sub-scores, keyed by tier name.
    pub breakdown: BTreeMap<String, f32>,
    pub explanation: String,
    /// Position in the scorer's input list (retrieval order). Tie-break key.
    pub retrieval_rank: usize,
}

impl ScoredMatch {
    pub fn new(
        product: CatalogProduct,
        confidence: f32,
        breakdown: BTreeMap<String, f32>,
        explanation: impl Into<String>,
        retrieval_rank: usize,
    ) -> Self {
        Self {
            product_id: product.id.clone(),
            product,
            confidence: clamp01(confidence),
            breakdown,
            explanation: explanation.into(),
            retrieval_rank,
        }
    }
}
