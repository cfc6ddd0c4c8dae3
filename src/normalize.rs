// src/normalize.rs
//! ProductAnalysis → ScanClassification. Pure and infallible.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Taxonomy;
use crate::model::{BrandInfo, ProductAnalysis, ScanClassification, TypedValue};
use crate::size::SizeParser;

pub const CLARITY_WITH_INGREDIENTS: f32 = 0.9;
pub const CLARITY_WITHOUT_INGREDIENTS: f32 = 0.5;

fn clean(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    taxonomy: Arc<Taxonomy>,
}

impl Normalizer {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    pub fn normalize(&self, analysis: &ProductAnalysis) -> ScanClassification {
        self.normalize_at(analysis, Utc::now())
    }

    pub fn normalize_at(&self, analysis: &ProductAnalysis, now: DateTime<Utc>) -> ScanClassification {
        let confidence = crate::text::clamp01(analysis.confidence);

        let form = analysis
            .form
            .as_deref()
            .map(clean)
            .filter(|f| !f.is_empty())
            .map(|raw| TypedValue { raw, confidence });

        let brand = analysis
            .brand
            .as_deref()
            .map(clean)
            .filter(|b| !b.is_empty())
            .map(|name| BrandInfo {
                categories: self.taxonomy.brand_categories(&name),
                name,
            });

        let ingredients: Vec<String> = analysis
            .ingredients
            .iter()
            .map(|i| clean(i))
            .filter(|i| !i.is_empty())
            .collect();
        let ingredient_clarity = if ingredients.is_empty() {
            CLARITY_WITHOUT_INGREDIENTS
        } else {
            CLARITY_WITH_INGREDIENTS
        };

        ScanClassification {
            product_type: TypedValue {
                raw: clean(&analysis.product_type),
                confidence,
            },
            form,
            brand,
            ingredients,
            ingredient_clarity,
            size: SizeParser::extract_size(&analysis.raw_text),
            raw_text: analysis.raw_text.clone(),
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParsedSize, SizeUnit};

    fn normalizer() -> Normalizer {
        Normalizer::new(Arc::new(Taxonomy::default_seed()))
    }

    #[test]
    fn fills_every_field() {
        let a = ProductAnalysis::new("  Hand   Sanitizer ", 0.9)
            .with_brand("Purell")
            .with_form("gel")
            .with_ingredients(["Ethyl Alcohol 70%", "water"])
            .with_raw_text("PURELL advanced hand sanitizer 8 fl oz");
        let now = Utc::now();
        let c = normalizer().normalize_at(&a, now);
        assert_eq!(c.product_type.raw, "Hand Sanitizer");
        assert_eq!(c.form_raw(), Some("gel"));
        let brand = c.brand.unwrap();
        assert_eq!(brand.name, "Purell");
        assert_eq!(brand.categories, vec!["Body Care".to_string()]);
        assert!((c.ingredient_clarity - 0.9).abs() < 1e-6);
        assert_eq!(
            c.size,
            Some(ParsedSize {
                value: 8.0,
                unit: SizeUnit::FluidOunce
            })
        );
        assert_eq!(c.timestamp, now);
    }

    #[test]
    fn empty_values_become_unknown() {
        let a = ProductAnalysis::new("Lip Balm", 0.6)
            .with_form("   ")
            .with_brand("Acme Unknown");
        let c = normalizer().normalize(&a);
        assert_eq!(c.form, None);
        assert!(c.brand.unwrap().categories.is_empty());
        assert!((c.ingredient_clarity - 0.5).abs() < 1e-6);
        assert_eq!(c.size, None);
    }
}
