// src/gate.rs
//! Hard exclusion gates applied to retrieved candidates before scoring.
//!
//! Gates run in a fixed order (accessory, use-case, form, descriptor) and the first
//! one that fires excludes the candidate. Survivors keep retrieval order.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::debug;

use crate::config::GateTables;
use crate::model::{CatalogProduct, ScanClassification};
use crate::text::{self, has_phrase, has_whole_phrase, roots_present};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Accessory,
    UseCase,
    FormIncompatible,
    Descriptor,
}

impl GateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateKind::Accessory => "accessory",
            GateKind::UseCase => "use_case",
            GateKind::FormIncompatible => "form_incompatible",
            GateKind::Descriptor => "descriptor",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateReport {
    pub survivors: Vec<CatalogProduct>,
    /// `(product_id, gate)` for each excluded candidate, in input order.
    pub excluded: Vec<(String, GateKind)>,
}

/// Scan-side facts computed once per `filter` call.
struct ScanView<'a> {
    type_words: Vec<String>,
    form: Option<String>,
    /// Descriptor roots a candidate name must share at least one of.
    required_descriptors: Vec<&'a str>,
    consumable: bool,
}

#[derive(Debug, Clone)]
pub struct MatchGate {
    tables: Arc<GateTables>,
}

impl MatchGate {
    pub fn new(tables: Arc<GateTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &GateTables {
        &self.tables
    }

    pub fn filter(&self, scan: &ScanClassification, candidates: Vec<CatalogProduct>) -> GateReport {
        let view = self.view(scan);
        let mut report = GateReport {
            survivors: Vec::with_capacity(candidates.len()),
            excluded: Vec::new(),
        };
        for cand in candidates {
            match self.first_failed(&view, &cand) {
                Some(kind) => {
                    debug!(product_id = %cand.id, gate = kind.as_str(), "candidate excluded");
                    counter!("gate_excluded_total", "gate" => kind.as_str()).increment(1);
                    report.excluded.push((cand.id, kind));
                }
                None => report.survivors.push(cand),
            }
        }
        report
    }

    /// First gate this candidate fails, if any.
    pub fn check(&self, scan: &ScanClassification, candidate: &CatalogProduct) -> Option<GateKind> {
        self.first_failed(&self.view(scan), candidate)
    }

    fn view<'a>(&'a self, scan: &ScanClassification) -> ScanView<'a> {
        let type_words = text::words(&scan.product_type.raw);
        let descriptors = roots_present(&type_words, &self.tables.descriptors);
        // a scan that names a product noun must share that noun, not just a texture
        let specific: Vec<&str> = descriptors
            .iter()
            .copied()
            .filter(|d| !self.tables.form_descriptors.iter().any(|f| f == d))
            .collect();
        let required_descriptors = if specific.is_empty() { descriptors } else { specific };
        let consumable = !self
            .tables
            .accessory_keywords
            .iter()
            .any(|k| has_whole_phrase(&type_words, k));
        ScanView {
            form: scan.form_raw().and_then(|f| self.known_form(f)),
            type_words,
            required_descriptors,
            consumable,
        }
    }

    fn first_failed(&self, scan: &ScanView<'_>, cand: &CatalogProduct) -> Option<GateKind> {
        let name_words = text::words(&cand.name);
        let mut name_type_words = name_words.clone();
        name_type_words.extend(text::words(&cand.product_type));

        if self.accessory_mismatch(scan, cand, &name_type_words) {
            return Some(GateKind::Accessory);
        }
        if self.use_case_mismatch(scan, &name_type_words) {
            return Some(GateKind::UseCase);
        }
        if self.form_incompatible(scan, cand) {
            return Some(GateKind::FormIncompatible);
        }
        if self.descriptor_missing(scan, &name_words) {
            return Some(GateKind::Descriptor);
        }
        None
    }

    fn accessory_mismatch(&self, scan: &ScanView<'_>, cand: &CatalogProduct, words: &[String]) -> bool {
        if !scan.consumable {
            return false;
        }
        let has_keyword = self
            .tables
            .accessory_keywords
            .iter()
            .any(|k| has_whole_phrase(words, k));
        if !has_keyword {
            return false;
        }
        let mut category = text::words(&cand.main_category);
        category.extend(text::words(&cand.product_type));
        let filed_as_accessory = self
            .tables
            .accessory_categories
            .iter()
            .any(|m| has_whole_phrase(&category, m));
        !filed_as_accessory
    }

    fn use_case_mismatch(&self, scan: &ScanView<'_>, words: &[String]) -> bool {
        self.tables.use_case.iter().any(|rule| {
            rule.trigger.iter().all(|t| has_phrase(&scan.type_words, t))
                && rule.forbidden.iter().any(|f| has_phrase(words, f))
        })
    }

    fn form_incompatible(&self, scan: &ScanView<'_>, cand: &CatalogProduct) -> bool {
        let (Some(scanned), Some(other)) = (
            scan.form.as_deref(),
            cand.form.as_deref().and_then(|f| self.known_form(f)),
        ) else {
            return false;
        };
        self.tables
            .form_incompatible
            .iter()
            .filter(|(key, _)| scanned.starts_with(key.as_str()))
            .any(|(_, banned)| banned.iter().any(|b| other.starts_with(b.as_str())))
    }

    fn descriptor_missing(&self, scan: &ScanView<'_>, name_words: &[String]) -> bool {
        !scan.required_descriptors.is_empty()
            && !scan
                .required_descriptors
                .iter()
                .any(|root| text::has_root(name_words, root))
    }

    /// Lowercased form, or None when empty or one of the "unknown" markers.
    fn known_form(&self, raw: &str) -> Option<String> {
        let f = text::normalize(raw);
        if f.is_empty() || self.tables.unknown_forms.iter().any(|u| text::normalize(u) == f) {
            None
        } else {
            Some(f)
        }
    }
}
