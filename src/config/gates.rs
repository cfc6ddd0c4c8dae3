// src/config/gates.rs
//! Exclusion tables for the match gates. Plain data: the gate engine receives an
//! `Arc<GateTables>`, so two pipelines can run side by side with different tuning.

use serde::Deserialize;
use std::collections::BTreeMap;

/// `trigger` phrases must ALL appear in the scanned product type; any `forbidden`
/// phrase in the candidate's name/type then excludes it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UseCaseRule {
    pub id: String,
    pub trigger: Vec<String>,
    pub forbidden: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GateTables {
    /// Whole words (plurals allowed) that mark an accessory or tool.
    pub accessory_keywords: Vec<String>,
    /// Whole words that file a candidate under an accessory/tool category.
    pub accessory_categories: Vec<String>,
    pub use_case: Vec<UseCaseRule>,
    /// Scanned form → candidate forms it can never be.
    pub form_incompatible: BTreeMap<String, Vec<String>>,
    /// Form values that mean "not known".
    pub unknown_forms: Vec<String>,
    /// Specific product-noun roots, matched as word prefixes.
    pub descriptors: Vec<String>,
    /// Descriptors that only name a texture or form. Sharing one of these is not
    /// enough when the scan also names a product noun.
    pub form_descriptors: Vec<String>,
}

impl Default for GateTables {
    fn default() -> Self {
        Self::default_seed()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl GateTables {
    /// Built-in seed for the personal-care catalog.
    pub fn default_seed() -> Self {
        let feminine = ["feminine", "intimate", "yoni", "vaginal"];
        let use_case = vec![
            UseCaseRule {
                id: "hand_wash_vs_feminine".into(),
                trigger: strings(&["hand", "wash"]),
                forbidden: strings(&feminine),
            },
            UseCaseRule {
                id: "body_wash_vs_feminine".into(),
                trigger: strings(&["body", "wash"]),
                forbidden: strings(&feminine),
            },
            UseCaseRule {
                id: "shampoo_vs_conditioner".into(),
                trigger: strings(&["shampoo"]),
                forbidden: strings(&["conditioner"]),
            },
            UseCaseRule {
                id: "conditioner_vs_shampoo".into(),
                trigger: strings(&["conditioner"]),
                forbidden: strings(&["shampoo"]),
            },
            UseCaseRule {
                id: "sanitizer_vs_soap".into(),
                trigger: strings(&["sanitizer"]),
                forbidden: strings(&["wash", "soap"]),
            },
        ];

        let mut form_incompatible = BTreeMap::new();
        let leave_on = ["lotion", "cream", "serum", "oil", "gel"];
        form_incompatible.insert("towelette".to_string(), strings(&leave_on));
        form_incompatible.insert("wipe".to_string(), strings(&leave_on));
        form_incompatible.insert(
            "powder".to_string(),
            strings(&["liquid", "cream", "gel", "lotion"]),
        );
        form_incompatible.insert(
            "bar".to_string(),
            strings(&["liquid", "gel", "foam", "spray"]),
        );
        form_incompatible.insert("spray".to_string(), strings(&["bar", "powder", "wax"]));
        form_incompatible.insert("stick".to_string(), strings(&["liquid", "spray"]));

        Self {
            accessory_keywords: strings(&[
                "brush",
                "applicator",
                "sponge",
                "tool",
                "case",
                "holder",
                "dispenser",
                "bonnet",
                "mirror",
                "organizer",
                "comb",
            ]),
            accessory_categories: strings(&["accessory", "tool"]),
            use_case,
            form_incompatible,
            unknown_forms: strings(&["other", "unknown", "n/a", "none"]),
            descriptors: strings(&[
                "sanitizer",
                "cleanser",
                "wash",
                "shampoo",
                "conditioner",
                "lotion",
                "serum",
                "powder",
                "towelette",
                "wipe",
                "cream",
                "moisturizer",
                "oil",
                "gel",
                "balm",
                "butter",
                "scrub",
                "mask",
                "masque",
                "soap",
                "deodorant",
                "spray",
                "mist",
                "toner",
                "polish",
                "gloss",
                "lipstick",
                "perfume",
                "cologne",
                "sunscreen",
                "exfoliat",
                "foam",
                "mousse",
                "pomade",
                "wax",
                "primer",
                "foundation",
                "concealer",
                "mascara",
                "candle",
                "vitamin",
                "supplement",
            ]),
            form_descriptors: strings(&[
                "gel", "oil", "cream", "spray", "foam", "mist", "wax", "mousse", "butter",
            ]),
        }
    }

    /// Lowercase and trim every phrase; drop empties.
    pub fn sanitize(&mut self) {
        fn clean(list: &mut Vec<String>) {
            for s in list.iter_mut() {
                *s = s.trim().to_lowercase();
            }
            list.retain(|s| !s.is_empty());
        }
        clean(&mut self.accessory_keywords);
        clean(&mut self.accessory_categories);
        clean(&mut self.unknown_forms);
        clean(&mut self.descriptors);
        clean(&mut self.form_descriptors);
        for rule in self.use_case.iter_mut() {
            clean(&mut rule.trigger);
            clean(&mut rule.forbidden);
        }
        self.use_case
            .retain(|r| !r.trigger.is_empty() && !r.forbidden.is_empty());

        let table = std::mem::take(&mut self.form_incompatible);
        for (form, mut banned) in table {
            clean(&mut banned);
            let key = form.trim().to_lowercase();
            if !key.is_empty() && !banned.is_empty() {
                self.form_incompatible.insert(key, banned);
            }
        }
    }
}
