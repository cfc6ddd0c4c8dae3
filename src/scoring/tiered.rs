// src/scoring/tiered.rs
//! Tiered weighted scoring over catalog metadata: product type, form, brand
//! category, ingredient clarity, size and a neutral visual placeholder.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{same_form, Explainer, Scorer, Tier};
use crate::config::{GateTables, ScoringConfig, Taxonomy, TierWeights};
use crate::model::{CatalogProduct, ScanClassification, ScoredMatch};
use crate::size::{SizeComparator, SizeParser};
use crate::text::{self, clamp01, has_root};

const NEUTRAL: f32 = 0.5;

pub struct TieredScorer {
    weights: TierWeights,
    explainer: Explainer,
    taxonomy: Arc<Taxonomy>,
    gates: Arc<GateTables>,
    sizes: Arc<dyn SizeComparator>,
}

impl TieredScorer {
    pub fn new(cfg: &ScoringConfig, taxonomy: Arc<Taxonomy>, gates: Arc<GateTables>) -> Self {
        Self {
            weights: cfg.tiered.clone(),
            explainer: Explainer::from_config(cfg),
            taxonomy,
            gates,
            sizes: Arc::new(SizeParser),
        }
    }

    pub fn with_size_comparator(mut self, sizes: Arc<dyn SizeComparator>) -> Self {
        self.sizes = sizes;
        self
    }

    /// The candidate's own type, or its name when the catalog left the type empty.
    fn candidate_type(cand: &CatalogProduct) -> &str {
        if cand.product_type.trim().is_empty() {
            &cand.name
        } else {
            &cand.product_type
        }
    }

    fn product_type_score(&self, scan: &ScanClassification, cand: &CatalogProduct) -> f32 {
        let scanned = text::normalize(&scan.product_type.raw);
        if scanned.is_empty() {
            return 0.0;
        }
        let cand_type = Self::candidate_type(cand);
        if scanned == text::normalize(cand_type) {
            return 1.0;
        }

        let tax = &self.taxonomy;
        if let (Some(a), Some(b)) = (tax.canonical_type(&scanned), tax.canonical_type(cand_type)) {
            if a == b {
                return 0.9;
            }
        }

        let cand_category = tax
            .category_of(cand_type)
            .map(str::to_string)
            .or_else(|| (!cand.main_category.trim().is_empty()).then(|| cand.main_category.clone()));
        if let (Some(a), Some(b)) = (tax.category_of(&scanned), cand_category) {
            if a.eq_ignore_ascii_case(b.trim()) {
                return 0.6;
            }
        }

        let scan_words = text::meaningful_words(&scanned);
        if scan_words.is_empty() {
            return 0.0;
        }
        let mut cand_words = text::words(cand_type);
        cand_words.extend(text::words(&cand.name));
        let overlap = scan_words.iter().filter(|w| has_root(&cand_words, w)).count();
        if overlap == 0 {
            0.0
        } else {
            0.3 + 0.3 * (overlap as f32 / scan_words.len() as f32)
        }
    }

    fn known_form(&self, raw: Option<&str>) -> Option<String> {
        let f = text::normalize(raw?);
        (!f.is_empty() && !self.gates.unknown_forms.contains(&f)).then_some(f)
    }

    fn form_score(&self, scan: &ScanClassification, cand: &CatalogProduct) -> f32 {
        match (
            self.known_form(scan.form_raw()),
            self.known_form(cand.form.as_deref()),
        ) {
            (Some(a), Some(b)) if same_form(&a, &b) => 1.0,
            (Some(a), Some(b)) if self.taxonomy.forms_compatible(&a, &b) => 0.7,
            (Some(_), Some(_)) => 0.3,
            _ => NEUTRAL,
        }
    }

    fn brand_category_score(&self, scan: &ScanClassification, cand: &CatalogProduct) -> f32 {
        let Some(brand) = scan.brand.as_ref() else {
            return NEUTRAL;
        };
        let category = cand.main_category.trim();
        if category.is_empty() {
            return NEUTRAL;
        }
        if brand
            .categories
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(category))
        {
            1.0
        } else if brand
            .categories
            .iter()
            .any(|c| self.taxonomy.categories_related(c.trim(), category))
        {
            0.7
        } else {
            NEUTRAL
        }
    }

    fn size_score(&self, scan: &ScanClassification, cand: &CatalogProduct) -> f32 {
        match (scan.size.as_ref(), SizeParser::extract_size(&cand.name)) {
            (Some(a), Some(b)) => clamp01(self.sizes.score_compatibility(a, &b)),
            _ => NEUTRAL,
        }
    }
}

impl Scorer for TieredScorer {
    fn score(&self, scan: &ScanClassification, candidates: &[CatalogProduct]) -> Vec<ScoredMatch> {
        let w = &self.weights;
        candidates
            .iter()
            .enumerate()
            .map(|(index, cand)| {
                let product_type = self.product_type_score(scan, cand);
                let form = self.form_score(scan, cand);
                let brand = self.brand_category_score(scan, cand);
                let clarity = clamp01(scan.ingredient_clarity);
                let size = self.size_score(scan, cand);
                let visual = NEUTRAL;

                let confidence = w.product_type * product_type
                    + w.form * form
                    + w.brand_category * brand
                    + w.ingredient_clarity * clarity
                    + w.size * size
                    + w.visual * visual;

                let breakdown: BTreeMap<String, f32> = [
                    ("product_type", product_type),
                    ("form", form),
                    ("brand_category", brand),
                    ("ingredient_clarity", clarity),
                    ("size", size),
                    ("visual", visual),
                ]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();

                let explanation = self.explainer.explain(&[
                    Tier::new(product_type, "Exact product type match", "Similar product type"),
                    Tier::new(form, "Exact form match", "Compatible form"),
                    Tier::new(brand, "Brand category match", "Related brand category"),
                    Tier::new(clarity, "Clear ingredient list", "Readable ingredients"),
                    Tier::new(size, "Same size", "Similar size"),
                ]);
                ScoredMatch::new(cand.clone(), confidence, breakdown, explanation, index)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "tiered"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProductAnalysis;
    use crate::normalize::Normalizer;

    fn scorer() -> TieredScorer {
        TieredScorer::new(
            &ScoringConfig::default(),
            Arc::new(Taxonomy::default_seed()),
            Arc::new(GateTables::default_seed()),
        )
    }

    fn scan(a: ProductAnalysis) -> ScanClassification {
        Normalizer::new(Arc::new(Taxonomy::default_seed())).normalize(&a)
    }

    #[test]
    fn product_type_ladder() {
        let sc = scorer();
        let s = scan(ProductAnalysis::new("Hand Sanitizer", 0.9));
        let exact = CatalogProduct::new("1", "Purell").with_product_type("hand sanitizer");
        let synonym = CatalogProduct::new("2", "Purell").with_product_type("Sanitizing Gel");
        let category = CatalogProduct::new("3", "Dove").with_product_type("Body Wash");
        let overlap = CatalogProduct::new("4", "Hand Cream Tube").with_product_type("Tube Cream");
        let none = CatalogProduct::new("5", "Shampoo").with_product_type("Shampoo");
        assert_eq!(sc.product_type_score(&s, &exact), 1.0);
        assert_eq!(sc.product_type_score(&s, &synonym), 0.9);
        assert_eq!(sc.product_type_score(&s, &category), 0.6);
        assert!((sc.product_type_score(&s, &overlap) - 0.45).abs() < 1e-6);
        assert_eq!(sc.product_type_score(&s, &none), 0.0);
    }

    #[test]
    fn form_scores() {
        let sc = scorer();
        let s = scan(ProductAnalysis::new("Body Lotion", 0.9).with_form("lotion"));
        let f = |form: Option<&str>| {
            let mut c = CatalogProduct::new("x", "Body Lotion");
            c.form = form.map(String::from);
            sc.form_score(&s, &c)
        };
        assert_eq!(f(Some("Lotion")), 1.0);
        assert_eq!(f(Some("butter")), 0.7);
        assert_eq!(f(Some("spray")), 0.3);
        assert_eq!(f(Some("other")), 0.5);
        assert_eq!(f(None), 0.5);
    }

    #[test]
    fn brand_category_scores() {
        let sc = scorer();
        let s = scan(ProductAnalysis::new("Hand Sanitizer", 0.9).with_brand("Purell"));
        let same = CatalogProduct::new("1", "x").with_category("Body Care");
        let related = CatalogProduct::new("2", "x").with_category("Skin Care");
        let other = CatalogProduct::new("3", "x").with_category("Hair Care");
        assert_eq!(sc.brand_category_score(&s, &same), 1.0);
        assert_eq!(sc.brand_category_score(&s, &related), 0.7);
        assert_eq!(sc.brand_category_score(&s, &other), 0.5);
    }

    #[test]
    fn weighted_total_and_explanation() {
        let s = scan(
            ProductAnalysis::new("Hand Sanitizer", 0.9)
                .with_brand("Purell")
                .with_form("gel")
                .with_ingredients(["alcohol"])
                .with_raw_text("8 fl oz"),
        );
        let c = vec![CatalogProduct::new("1", "Purell Hand Sanitizer 8 fl oz")
            .with_product_type("Hand Sanitizer")
            .with_form("gel")
            .with_category("Body Care")];
        let out = scorer().score(&s, &c);
        // 0.40 + 0.25 + 0.15 + 0.09 + 0.05 + 0.025
        assert!((out[0].confidence - 0.965).abs() < 1e-4);
        assert_eq!(
            out[0].explanation,
            "Exact product type match, Exact form match, Brand category match, Clear ingredient list, Same size"
        );
        assert_eq!(out[0].breakdown.len(), 6);
    }
}
