// src/config/taxonomy.rs
//! Product-type synonyms, category tree and brand directory used by the tiered
//! scorer and the normalizer, plus the tables that classify catalog documents
//! arriving without a product type or with a noisy category.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::text;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Taxonomy {
    /// Lowercased synonym → canonical product type.
    pub synonyms: BTreeMap<String, String>,
    /// Canonical product type → main category.
    pub type_categories: BTreeMap<String, String>,
    /// Forms that count as compatible with each other.
    pub form_groups: Vec<Vec<String>>,
    /// Unordered pairs of main categories that are related.
    pub related_categories: Vec<(String, String)>,
    /// Lowercased brand → categories the brand sells in.
    pub brands: BTreeMap<String, Vec<String>>,
    /// Lowercased raw category phrase → clean main category. Longest phrase wins.
    pub category_aliases: BTreeMap<String, String>,
    /// Name patterns tried, in order, when no synonym names the product type.
    pub type_patterns: Vec<TypePattern>,
    /// Phrases that put a product under Women's Care whatever its raw category.
    pub womens_care: Vec<String>,
    /// Splits of broad categories by name keywords, first match wins.
    pub category_splits: Vec<CategorySplit>,
}

/// `first` word (any of) followed later in the name by a `then` word (any of).
/// An empty `then` matches on `first` alone.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypePattern {
    pub first: Vec<String>,
    #[serde(default)]
    pub then: Vec<String>,
    pub product_type: String,
}

/// Products in category `from` whose name or type mentions any of `keywords`
/// move to `into`. Empty `keywords` catches the rest of `from`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategorySplit {
    pub from: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub into: String,
}

pub const WOMENS_CARE: &str = "Women's Care";

impl Default for Taxonomy {
    fn default() -> Self {
        Self::default_seed()
    }
}

fn pairs(items: &[(&str, &str)]) -> BTreeMap<String, String> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn group(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn pattern(first: &[&str], then: &[&str], product_type: &str) -> TypePattern {
    TypePattern {
        first: group(first),
        then: group(then),
        product_type: product_type.to_string(),
    }
}

fn split(from: &str, keywords: &[&str], into: &str) -> CategorySplit {
    CategorySplit {
        from: from.to_string(),
        keywords: group(keywords),
        into: into.to_string(),
    }
}

fn lower_all(list: &mut Vec<String>) {
    for s in list.iter_mut() {
        *s = s.trim().to_lowercase();
    }
    list.retain(|s| !s.is_empty());
}

/// Phrases sorted so longer ones (more words, then more chars) are tried first.
fn longest_first<'a, V>(map: &'a BTreeMap<String, V>) -> Vec<(&'a String, &'a V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by_key(|(k, _)| (std::cmp::Reverse(text::words(k).len()), std::cmp::Reverse(k.len())));
    entries
}

impl Taxonomy {
    pub fn default_seed() -> Self {
        let synonyms = pairs(&[
            ("hand sanitizer", "Hand Sanitizer"),
            ("sanitizing gel", "Hand Sanitizer"),
            ("hand sanitizing gel", "Hand Sanitizer"),
            ("hand soap", "Hand Soap"),
            ("hand wash", "Hand Soap"),
            ("body wash", "Body Wash"),
            ("shower gel", "Body Wash"),
            ("body lotion", "Body Lotion"),
            ("body butter", "Body Butter"),
            ("deodorant", "Deodorant"),
            ("face wash", "Face Cleanser"),
            ("facial cleanser", "Face Cleanser"),
            ("facial wash", "Face Cleanser"),
            ("face cleanser", "Face Cleanser"),
            ("face cream", "Face Moisturizer"),
            ("facial moisturizer", "Face Moisturizer"),
            ("face moisturizer", "Face Moisturizer"),
            ("face serum", "Face Serum"),
            ("facial towelettes", "Face Wipes"),
            ("makeup wipes", "Face Wipes"),
            ("cleansing wipes", "Face Wipes"),
            ("face wipes", "Face Wipes"),
            ("lip balm", "Lip Balm"),
            ("chapstick", "Lip Balm"),
            ("lip gloss", "Lip Gloss"),
            ("nail polish", "Nail Polish"),
            ("shampoo", "Shampoo"),
            ("conditioner", "Conditioner"),
            ("leave in conditioner", "Leave-In Conditioner"),
            ("hair oil", "Hair Oil"),
            ("hair gel", "Hair Gel"),
            ("edge control", "Hair Gel"),
            ("curl cream", "Hair Cream"),
            ("hair cream", "Hair Cream"),
            ("perfume", "Perfume"),
            ("cologne", "Perfume"),
        ]);

        let type_categories = pairs(&[
            ("Hand Sanitizer", "Body Care"),
            ("Hand Soap", "Body Care"),
            ("Body Wash", "Body Care"),
            ("Body Lotion", "Body Care"),
            ("Body Butter", "Body Care"),
            ("Deodorant", "Body Care"),
            ("Face Cleanser", "Skin Care"),
            ("Face Moisturizer", "Skin Care"),
            ("Face Serum", "Skin Care"),
            ("Face Wipes", "Skin Care"),
            ("Lip Balm", "Skin Care"),
            ("Lip Gloss", "Makeup"),
            ("Nail Polish", "Makeup"),
            ("Shampoo", "Hair Care"),
            ("Conditioner", "Hair Care"),
            ("Leave-In Conditioner", "Hair Care"),
            ("Hair Oil", "Hair Care"),
            ("Hair Gel", "Hair Care"),
            ("Hair Cream", "Hair Care"),
            ("Perfume", "Fragrance"),
        ]);

        let form_groups = vec![
            group(&["cream", "lotion", "butter", "balm"]),
            group(&["oil", "serum"]),
            group(&["gel", "gelly", "jelly"]),
            group(&["spray", "mist"]),
            group(&["foam", "mousse"]),
            group(&["liquid", "wash"]),
            group(&["wax", "pomade"]),
            group(&["towelette", "wipe"]),
        ];

        let related_categories = [
            ("Skin Care", "Body Care"),
            ("Hair Care", "Men's Care"),
            ("Skin Care", "Makeup"),
            ("Body Care", "Women's Care"),
            ("Fragrance", "Body Care"),
        ]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();

        let brands = [
            ("purell", vec!["Body Care"]),
            ("cantu", vec!["Hair Care"]),
            ("shea moisture", vec!["Hair Care", "Skin Care", "Body Care"]),
            ("sheamoisture", vec!["Hair Care", "Skin Care", "Body Care"]),
            ("carol's daughter", vec!["Hair Care", "Body Care"]),
            ("mielle", vec!["Hair Care"]),
            ("dove", vec!["Body Care", "Skin Care", "Hair Care"]),
            ("neutrogena", vec!["Skin Care"]),
            ("cerave", vec!["Skin Care"]),
            ("burt's bees", vec!["Skin Care", "Body Care"]),
        ]
        .into_iter()
        .map(|(b, cats)| (b.to_string(), cats.into_iter().map(String::from).collect()))
        .collect();

        let category_aliases = pairs(&[
            ("hair care", "Hair Care"),
            ("hair", "Hair Care"),
            ("natural hair", "Hair Care"),
            ("skin care", "Skin Care"),
            ("skincare", "Skin Care"),
            ("skin", "Skin Care"),
            ("face", "Skin Care"),
            ("body care", "Body Care"),
            ("bath & body", "Body Care"),
            ("bath and body", "Body Care"),
            ("personal care", "Body Care"),
            ("makeup", "Makeup"),
            ("cosmetics", "Makeup"),
            ("nails", "Makeup"),
            ("fragrance", "Fragrance"),
            ("perfume", "Fragrance"),
            ("men's care", "Men's Care"),
            ("men's grooming", "Men's Care"),
            ("men", "Men's Care"),
            ("women's care", WOMENS_CARE),
            ("feminine care", WOMENS_CARE),
            ("health & wellness", "Health & Wellness"),
            ("health and wellness", "Health & Wellness"),
            ("wellness", "Health & Wellness"),
            ("vitamins", "Vitamins & Supplements"),
            ("supplements", "Vitamins & Supplements"),
            ("accessories", "Accessories"),
            ("tools", "Accessories"),
            ("home care", "Home Care"),
            ("home", "Home Care"),
            ("books", "Books & More"),
        ]);

        let type_patterns = vec![
            pattern(&["mask", "masque"], &[], "Face Mask"),
            pattern(&["cream", "creme"], &["hair", "curl"], "Hair Cream"),
            pattern(&["oil"], &["hair", "scalp"], "Hair Oil"),
            pattern(&["gel", "gelly", "custard"], &["hair", "curl", "style"], "Hair Gel"),
            pattern(&["butter"], &["hair", "curl"], "Hair Butter"),
            pattern(&["brush"], &["hair", "wave", "style"], "Hair Brush"),
            pattern(&["shampoo"], &[], "Shampoo"),
            pattern(&["conditioner"], &[], "Conditioner"),
            pattern(&["serum"], &["face", "facial", "skin"], "Face Serum"),
            pattern(&["scrub"], &["face", "facial"], "Face Scrub"),
            pattern(&["scrub"], &["body"], "Body Scrub"),
            pattern(&["moisturizer"], &["face", "facial"], "Face Moisturizer"),
            pattern(&["moisturizer", "lotion"], &["body"], "Body Lotion"),
            pattern(&["cleanser"], &["face", "facial"], "Face Cleanser"),
            pattern(&["balm"], &["lip"], "Lip Balm"),
            pattern(&["gloss"], &["lip"], "Lip Gloss"),
            pattern(&["polish"], &["nail"], "Nail Polish"),
            pattern(&["candle"], &[], "Scented Candle"),
            pattern(&["perfume", "fragrance", "cologne"], &[], "Perfume"),
            pattern(&["soap"], &["bar"], "Bar Soap"),
            pattern(&["vitamin", "supplement"], &[], "Vitamins"),
        ];

        let womens_care = group(&[
            "yoni",
            "feminine wash",
            "feminine hygiene",
            "feminine deodorant",
            "feminine care",
            "feminine spray",
            "feminine oil",
            "feminine foam",
            "intimate wash",
            "intimate spray",
            "intimate oil",
            "intimate gel",
            "vagina",
            "menstrual",
            "period underwear",
            "boric acid",
            "v steam",
            "womb detox",
            "ph balance",
            "prenatal",
            "postpartum",
            "ovulation",
        ]);

        let category_splits = vec![
            split(
                "Health & Wellness",
                &[
                    "vitamin",
                    "supplement",
                    "protein",
                    "collagen",
                    "probiotic",
                    "gumm",
                    "creatine",
                    "elderberry",
                    "melatonin",
                    "multivitamin",
                    "capsule",
                    "tablet",
                    "sea moss",
                ],
                "Vitamins & Supplements",
            ),
            split("Health & Wellness", &["razor", "beard", "shav", "grooming"], "Men's Care"),
            split("Health & Wellness", &[], "Body Care"),
            split("Accessories", &["battery", "batteries", "charger"], "Home Care"),
            split(
                "Accessories",
                &["book", "ebook", "journal", "planner", "workbook", "coloring", "postcard", "stationery"],
                "Books & More",
            ),
        ];

        Self {
            synonyms,
            type_categories,
            form_groups,
            related_categories,
            brands,
            category_aliases,
            type_patterns,
            womens_care,
            category_splits,
        }
    }

    /// Lowercase lookup keys so callers can compare against normalized text.
    pub fn sanitize(&mut self) {
        self.synonyms = std::mem::take(&mut self.synonyms)
            .into_iter()
            .map(|(k, v)| (text::normalize(&k), v.trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
        self.brands = std::mem::take(&mut self.brands)
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        for g in self.form_groups.iter_mut() {
            for f in g.iter_mut() {
                *f = f.trim().to_lowercase();
            }
            g.retain(|f| !f.is_empty());
        }
        self.form_groups.retain(|g| g.len() > 1);

        self.category_aliases = std::mem::take(&mut self.category_aliases)
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
        for p in self.type_patterns.iter_mut() {
            lower_all(&mut p.first);
            lower_all(&mut p.then);
            p.product_type = p.product_type.trim().to_string();
        }
        self.type_patterns
            .retain(|p| !p.first.is_empty() && !p.product_type.is_empty());
        lower_all(&mut self.womens_care);
        for s in self.category_splits.iter_mut() {
            lower_all(&mut s.keywords);
            s.from = s.from.trim().to_string();
            s.into = s.into.trim().to_string();
        }
        self.category_splits
            .retain(|s| !s.from.is_empty() && !s.into.is_empty());
    }

    /// Product type inferred from a catalog name, falling back to its raw category:
    /// a synonym as a whole phrase, then a synonym's words in any order, then the
    /// name patterns.
    pub fn infer_product_type(&self, name: &str, raw_category: &str) -> Option<String> {
        let words = text::words(name);
        let synonyms = longest_first(&self.synonyms);

        let phrase_hit = |words: &[String]| {
            synonyms
                .iter()
                .find(|(syn, _)| text::has_whole_phrase(words, syn))
                .map(|(_, canonical)| canonical.to_string())
        };
        if let Some(t) = phrase_hit(&words) {
            return Some(t);
        }
        let scattered = synonyms.iter().find(|(syn, _)| {
            text::words(syn)
                .iter()
                .all(|p| words.iter().any(|w| text::is_word_or_plural(w, p)))
        });
        if let Some((_, canonical)) = scattered {
            return Some(canonical.to_string());
        }
        if let Some(t) = phrase_hit(&text::words(raw_category)) {
            return Some(t);
        }

        fn is_any(word: &str, list: &[String]) -> bool {
            list.iter().any(|p| text::is_word_or_plural(word, p))
        }
        self.type_patterns
            .iter()
            .find(|p| {
                words.iter().enumerate().any(|(i, w)| {
                    is_any(w, &p.first) && (p.then.is_empty() || words[i + 1..].iter().any(|l| is_any(l, &p.then)))
                })
            })
            .map(|p| p.product_type.clone())
    }

    /// Clean main category: the raw category through the alias table, else the
    /// product type's category, else an alias phrase found in the name.
    pub fn main_category_for(&self, raw_category: &str, product_type: &str, name: &str) -> Option<String> {
        let aliases = longest_first(&self.category_aliases);
        let alias_in = |input: &str| {
            let words = text::words(input);
            aliases
                .iter()
                .find(|(k, _)| text::has_whole_phrase(&words, k))
                .map(|(_, v)| v.to_string())
        };
        alias_in(raw_category)
            .or_else(|| self.category_of(product_type).map(str::to_string))
            .or_else(|| alias_in(name))
    }

    pub fn is_womens_care(&self, name_and_type: &str) -> bool {
        let words = text::words(name_and_type);
        self.womens_care.iter().any(|k| text::has_phrase(&words, k))
    }

    /// Women's Care first, then the category splits; otherwise `main` unchanged.
    pub fn refine_category(&self, main: &str, name_and_type: &str) -> String {
        if self.is_womens_care(name_and_type) {
            return WOMENS_CARE.to_string();
        }
        let words = text::words(name_and_type);
        self.category_splits
            .iter()
            .filter(|s| s.from.eq_ignore_ascii_case(main.trim()))
            .find(|s| s.keywords.is_empty() || s.keywords.iter().any(|k| text::has_phrase(&words, k)))
            .map(|s| s.into.clone())
            .unwrap_or_else(|| main.to_string())
    }

    /// Canonical product type for a free-text type, if the text is a known synonym
    /// or already a canonical name.
    pub fn canonical_type(&self, product_type: &str) -> Option<&str> {
        let key = text::normalize(product_type);
        if key.is_empty() {
            return None;
        }
        if let Some(c) = self.synonyms.get(&key) {
            return Some(c.as_str());
        }
        self.type_categories
            .keys()
            .find(|k| text::normalize(k) == key)
            .map(|k| k.as_str())
    }

    /// Main category a product type belongs to.
    pub fn category_of(&self, product_type: &str) -> Option<&str> {
        let canonical = self.canonical_type(product_type)?;
        self.type_categories.get(canonical).map(|c| c.as_str())
    }

    /// Both forms share a compatibility group (prefix compare, so plurals match).
    pub fn forms_compatible(&self, a: &str, b: &str) -> bool {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        self.form_groups.iter().any(|g| {
            g.iter().any(|f| a.starts_with(f.as_str())) && g.iter().any(|f| b.starts_with(f.as_str()))
        })
    }

    pub fn categories_related(&self, a: &str, b: &str) -> bool {
        self.related_categories.iter().any(|(x, y)| {
            (x.eq_ignore_ascii_case(a) && y.eq_ignore_ascii_case(b))
                || (x.eq_ignore_ascii_case(b) && y.eq_ignore_ascii_case(a))
        })
    }

    /// Categories for a brand name; empty when the brand is unknown.
    pub fn brand_categories(&self, brand: &str) -> Vec<String> {
        self.brands
            .get(&brand.trim().to_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonyms_resolve_to_canonical_types() {
        let t = Taxonomy::default_seed();
        assert_eq!(t.canonical_type("Sanitizing Gel"), Some("Hand Sanitizer"));
        assert_eq!(t.canonical_type("hand sanitizer"), Some("Hand Sanitizer"));
        assert_eq!(t.category_of("Shower Gel"), Some("Body Care"));
        assert_eq!(t.canonical_type("spaceship"), None);
    }

    #[test]
    fn form_groups_accept_plurals() {
        let t = Taxonomy::default_seed();
        assert!(t.forms_compatible("lotion", "creams"));
        assert!(t.forms_compatible("Towelettes", "wipe"));
        assert!(!t.forms_compatible("gel", "powder"));
    }

    #[test]
    fn related_categories_are_symmetric() {
        let t = Taxonomy::default_seed();
        assert!(t.categories_related("Body Care", "Skin Care"));
        assert!(t.categories_related("skin care", "body care"));
        assert!(!t.categories_related("Hair Care", "Fragrance"));
    }

    #[test]
    fn product_type_is_inferred_from_the_name() {
        let t = Taxonomy::default_seed();
        assert_eq!(t.infer_product_type("Purell Advanced Hand Sanitizer Gel", "").as_deref(), Some("Hand Sanitizer"));
        // synonym words out of order
        assert_eq!(t.infer_product_type("Nail Gel Polish", "").as_deref(), Some("Nail Polish"));
        assert_eq!(t.infer_product_type("Curl Custard for Natural Hair", "").as_deref(), Some("Hair Gel"));
        assert_eq!(t.infer_product_type("Honey Oatmeal Soap Bar", "").as_deref(), Some("Bar Soap"));
        assert_eq!(t.infer_product_type("Mystery Item", "Lip Balm & Care").as_deref(), Some("Lip Balm"));
        assert_eq!(t.infer_product_type("Mystery Item", ""), None);
    }

    #[test]
    fn main_category_maps_noisy_categories() {
        let t = Taxonomy::default_seed();
        assert_eq!(t.main_category_for("Bath & Body", "", "x").as_deref(), Some("Body Care"));
        // "men" must not match inside "women's"
        assert_eq!(t.main_category_for("Women's Care", "", "x").as_deref(), Some(WOMENS_CARE));
        assert_eq!(t.main_category_for("Men's Grooming", "", "x").as_deref(), Some("Men's Care"));
        assert_eq!(t.main_category_for("", "Shampoo", "x").as_deref(), Some("Hair Care"));
        assert_eq!(t.main_category_for("Misc", "", "Hair Growth Oil").as_deref(), Some("Hair Care"));
        assert_eq!(t.main_category_for("Misc", "", "Gift Card"), None);
    }

    #[test]
    fn refinement_puts_feminine_care_first_and_splits_wellness() {
        let t = Taxonomy::default_seed();
        assert_eq!(t.refine_category("Body Care", "Yoni Oil Blend"), WOMENS_CARE);
        assert_eq!(t.refine_category("Health & Wellness", "Elderberry Gummies"), "Vitamins & Supplements");
        assert_eq!(t.refine_category("Health & Wellness", "Beard Shaving Cream"), "Men's Care");
        assert_eq!(t.refine_category("Health & Wellness", "Charcoal Toothpaste"), "Body Care");
        assert_eq!(t.refine_category("Accessories", "Gratitude Journal"), "Books & More");
        assert_eq!(t.refine_category("Hair Care", "Argan Hair Oil"), "Hair Care");
    }

    #[test]
    fn brand_lookup_is_case_insensitive() {
        let t = Taxonomy::default_seed();
        assert_eq!(t.brand_categories(" PURELL "), vec!["Body Care".to_string()]);
        assert!(t.brand_categories("Nobody Inc").is_empty());
    }
}
