// src/catalog.rs
//! Catalog document cleanup: turns a raw search-index document into a
//! `CatalogProduct` with a clean name and inferred form, bundle flag and tags.
//! `classify_document` then fills product type and main category from the taxonomy.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Taxonomy;
use crate::model::CatalogProduct;
use crate::text;

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

/// Form → keywords that indicate it. First hit wins, so order matters.
const FORM_KEYWORDS: &[(&str, &[&str])] = &[
    ("oil", &["oil", "serum"]),
    ("cream", &["cream", "lotion", "butter"]),
    ("gel", &["gel", "gelly"]),
    ("spray", &["spray", "mist"]),
    ("foam", &["foam", "mousse"]),
    ("bar", &["bar", "soap bar"]),
    ("serum", &["serum"]),
    ("balm", &["balm"]),
    ("wax", &["wax", "pomade"]),
    ("powder", &["powder"]),
    ("liquid", &["liquid", "shampoo", "conditioner"]),
];

const BUNDLE_WORDS: &[&str] = &[
    "kit",
    "set",
    "sets",
    "bundle",
    "bundles",
    "pack",
    "duo",
    "trio",
    "collection",
    "system",
];

pub const FORM_OTHER: &str = "other";
pub const BUNDLE: &str = "kit/bundle";
pub const SINGLE: &str = "single";
const TYPE_OTHER: &str = "other";

const MAX_TAGS: usize = 5;

/// Decode HTML entities, strip tags, collapse whitespace.
pub fn clean_name(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let stripped = RE_TAG.replace_all(&decoded, " ");
    RE_WS.replace_all(stripped.trim(), " ").into_owned()
}

/// Form keyword found in the name, or `"other"`.
pub fn extract_form(name: &str) -> &'static str {
    let words = text::words(name);
    FORM_KEYWORDS
        .iter()
        .find(|(_, keys)| keys.iter().any(|k| text::has_phrase(&words, k)))
        .map(|(form, _)| *form)
        .unwrap_or(FORM_OTHER)
}

/// `"kit/bundle"` when a bundle word appears as a whole word, else `"single"`.
pub fn detect_set_bundle(name: &str) -> &'static str {
    let words = text::words(name);
    if words.iter().any(|w| BUNDLE_WORDS.contains(&w.as_str())) {
        BUNDLE
    } else {
        SINGLE
    }
}

/// Up to five meaningful name words, deduplicated, in name order.
pub fn extract_tags(name: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(MAX_TAGS);
    for w in text::meaningful_words(name) {
        if tags.len() == MAX_TAGS {
            break;
        }
        if !tags.contains(&w) {
            tags.push(w);
        }
    }
    tags
}

/// Fill inferred fields of a document fresh from the index.
pub fn normalize_document(mut doc: CatalogProduct) -> CatalogProduct {
    doc.name = clean_name(&doc.name);
    doc.company = clean_name(&doc.company);

    let form = match doc.form.as_deref().map(str::trim) {
        Some(f) if !f.is_empty() => f.to_lowercase(),
        _ => extract_form(&doc.name).to_string(),
    };
    doc.form = (form != FORM_OTHER).then_some(form);

    if doc.tags.is_empty() {
        doc.tags = extract_tags(&doc.name);
    }
    if doc.set_bundle.as_deref().map_or(true, |s| s.trim().is_empty()) {
        doc.set_bundle = Some(detect_set_bundle(&doc.name).to_string());
    }
    doc
}

/// Infer a missing product type, map the raw category to the clean tree and refine it.
/// A product type the document already carries is kept.
pub fn classify_document(mut doc: CatalogProduct, taxonomy: &Taxonomy) -> CatalogProduct {
    let existing = doc.product_type.trim();
    if existing.is_empty() || existing.eq_ignore_ascii_case(TYPE_OTHER) {
        if let Some(t) = taxonomy.infer_product_type(&doc.name, &doc.main_category) {
            doc.product_type = t;
        }
    }
    if let Some(main) = taxonomy.main_category_for(&doc.main_category, &doc.product_type, &doc.name) {
        doc.main_category = main;
    }
    let name_and_type = format!("{} {}", doc.name, doc.product_type);
    doc.main_category = taxonomy.refine_category(&doc.main_category, &name_and_type);
    doc
}
