//! Gate soundness over hand-picked rows plus a seeded synthetic grid.
//! Every survivor must pass every gate, every exclusion must name the first gate
//! it fails, and nothing downstream may resurrect an excluded candidate.

use std::collections::HashSet;
use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};

use scan_matcher::config::{GateTables, MatchConfig, ScorerKind, Taxonomy};
use scan_matcher::gate::{GateKind, MatchGate};
use scan_matcher::model::{CatalogProduct, ProductAnalysis, ScanClassification};
use scan_matcher::normalize::Normalizer;
use scan_matcher::rank::rank;
use scan_matcher::scoring::build_scorer;

fn gate() -> MatchGate {
    MatchGate::new(Arc::new(GateTables::default_seed()))
}

fn classify(product_type: &str, form: Option<&str>) -> ScanClassification {
    let mut a = ProductAnalysis::new(product_type, 0.9);
    if let Some(f) = form {
        a = a.with_form(f);
    }
    Normalizer::new(Arc::new(Taxonomy::default_seed())).normalize(&a)
}

struct Row {
    scan: (&'static str, Option<&'static str>),
    candidate: CatalogProduct,
    expect: Option<GateKind>,
    why: &'static str,
}

fn handpicked() -> Vec<Row> {
    vec![
        Row {
            scan: ("Hand Sanitizer", Some("gel")),
            candidate: CatalogProduct::new("1", "Purell Advanced Hand Sanitizer Gel").with_form("gel"),
            expect: None,
            why: "same product",
        },
        Row {
            scan: ("Hand Sanitizer", Some("gel")),
            candidate: CatalogProduct::new("2", "Nail Gel Polish").with_form("gel"),
            expect: Some(GateKind::Descriptor),
            why: "shares only the form word",
        },
        Row {
            scan: ("Hand Sanitizer", Some("gel")),
            candidate: CatalogProduct::new("3", "Foaming Hand Wash").with_form("liquid"),
            expect: Some(GateKind::UseCase),
            why: "sanitizer is not soap",
        },
        Row {
            scan: ("Body Lotion", Some("lotion")),
            candidate: CatalogProduct::new("4", "Lotion Dispenser Pump").with_category("Body Care"),
            expect: Some(GateKind::Accessory),
            why: "consumable scan, accessory candidate",
        },
        Row {
            scan: ("Body Lotion", Some("lotion")),
            candidate: CatalogProduct::new("5", "Travel Lotion Case").with_category("Accessories"),
            expect: None,
            why: "filed as an accessory, left to scoring",
        },
        Row {
            scan: ("Hand Wash", None),
            candidate: CatalogProduct::new("6", "Gentle Feminine Wash"),
            expect: Some(GateKind::UseCase),
            why: "hand wash vs feminine wash",
        },
        Row {
            scan: ("Facial Towelettes", Some("towelettes")),
            candidate: CatalogProduct::new("7", "Facial Towelette Cleansing Oil").with_form("oil"),
            expect: Some(GateKind::FormIncompatible),
            why: "wipes are not leave-on oils",
        },
        Row {
            scan: ("Facial Towelettes", None),
            candidate: CatalogProduct::new("8", "Gentle Facial Wash"),
            expect: Some(GateKind::Descriptor),
            why: "no towelette in the name",
        },
        Row {
            scan: ("Facial Towelettes", None),
            candidate: CatalogProduct::new("9", "Cleansing Facial Towelettes 25 ct"),
            expect: None,
            why: "descriptor present",
        },
        Row {
            scan: ("Shampoo", None),
            candidate: CatalogProduct::new("10", "Moisture Conditioner"),
            expect: Some(GateKind::UseCase),
            why: "shampoo vs conditioner",
        },
        Row {
            scan: ("Hand Sanitizer Gel", Some("gel")),
            candidate: CatalogProduct::new("11", "Nail Gel Polish").with_form("gel"),
            expect: Some(GateKind::Descriptor),
            why: "gel alone does not make a sanitizer",
        },
        Row {
            scan: ("Hand Sanitizer Gel", Some("gel")),
            candidate: CatalogProduct::new("12", "Purell Hand Sanitizer Gel").with_form("gel"),
            expect: None,
            why: "shares the product noun",
        },
        Row {
            scan: ("Whey Protein Powder", None),
            candidate: CatalogProduct::new("13", "Casein Protein Powder"),
            expect: None,
            why: "casein is not a case",
        },
        Row {
            scan: ("Body Lotion", Some("lotion")),
            candidate: CatalogProduct::new("14", "Lotion Dispenser").with_category("Bath Stools"),
            expect: Some(GateKind::Accessory),
            why: "stools is not a tool category",
        },
    ]
}

#[test]
fn handpicked_rows() {
    let g = gate();
    let mut failures = Vec::new();
    for row in handpicked() {
        let scan = classify(row.scan.0, row.scan.1);
        let got = g.check(&scan, &row.candidate);
        if got != row.expect {
            failures.push(format!(
                "{} vs {}: expected {:?}, got {:?} ({})",
                row.scan.0, row.candidate.name, row.expect, got, row.why
            ));
        }
    }
    assert!(failures.is_empty(), "gate mismatches:\n{}", failures.join("\n"));
}

const SCAN_TYPES: &[&str] = &[
    "Hand Sanitizer",
    "Hand Wash",
    "Body Wash",
    "Body Lotion",
    "Shampoo",
    "Conditioner",
    "Facial Towelettes",
    "Lip Balm",
    "Face Serum",
    "Beauty Product",
    "Detangling Brush",
];

const FORMS: &[&str] = &["gel", "liquid", "lotion", "cream", "spray", "bar", "powder", "towelette", "stick", "other"];

const NAME_PARTS: &[&str] = &[
    "Purell", "Advanced", "Hand", "Sanitizer", "Gel", "Nail", "Polish", "Foaming", "Wash",
    "Feminine", "Body", "Lotion", "Shea", "Butter", "Shampoo", "Conditioner", "Facial",
    "Towelettes", "Lip", "Balm", "Serum", "Brush", "Dispenser", "Case", "Soap", "Travel",
];

const CATEGORIES: &[&str] = &["Body Care", "Hair Care", "Skin Care", "Accessories", "Tools", ""];

fn pick<'a>(rng: &mut StdRng, items: &'a [&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

fn random_candidate(rng: &mut StdRng, id: usize) -> CatalogProduct {
    let words = rng.random_range(2..=5);
    let name: Vec<&str> = (0..words).map(|_| pick(rng, NAME_PARTS)).collect();
    let mut p = CatalogProduct::new(format!("c{id}"), name.join(" ")).with_category(pick(rng, CATEGORIES));
    if rng.random_bool(0.7) {
        p = p.with_form(pick(rng, FORMS));
    }
    p
}

fn random_scan(rng: &mut StdRng) -> ScanClassification {
    let form = rng.random_bool(0.6).then(|| pick(rng, FORMS));
    classify(pick(rng, SCAN_TYPES), form)
}

#[test]
fn synthetic_filter_is_sound_and_order_preserving() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let g = gate();

    for round in 0..200 {
        let scan = random_scan(&mut rng);
        let n = rng.random_range(0..40);
        let candidates: Vec<CatalogProduct> = (0..n).map(|i| random_candidate(&mut rng, i)).collect();
        let input_ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();

        let report = g.filter(&scan, candidates.clone());
        assert_eq!(
            report.survivors.len() + report.excluded.len(),
            n,
            "round {round}: every candidate is kept or excluded"
        );

        for s in &report.survivors {
            assert_eq!(g.check(&scan, s), None, "round {round}: survivor {} fails a gate", s.name);
        }
        for (id, kind) in &report.excluded {
            let cand = candidates.iter().find(|c| &c.id == id).expect("excluded id comes from input");
            assert_eq!(g.check(&scan, cand), Some(*kind), "round {round}: wrong gate for {}", cand.name);
        }

        // survivors keep retrieval order
        let positions: Vec<usize> = report
            .survivors
            .iter()
            .map(|s| input_ids.iter().position(|id| id == &s.id).expect("survivor from input"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "round {round}: order changed");
    }
}

#[test]
fn scoring_never_resurrects_excluded_candidates() {
    let mut rng = StdRng::seed_from_u64(7);
    let g = gate();

    for strategy in [ScorerKind::PositionTrust, ScorerKind::Tiered] {
        let mut cfg = MatchConfig::default();
        cfg.scoring.strategy = strategy;
        let scorer = build_scorer(
            &cfg.scoring,
            Arc::new(cfg.taxonomy.clone()),
            Arc::new(cfg.gates.clone()),
        );

        for _ in 0..100 {
            let scan = random_scan(&mut rng);
            let candidates: Vec<CatalogProduct> = (0..25).map(|i| random_candidate(&mut rng, i)).collect();
            let report = g.filter(&scan, candidates);
            let excluded: HashSet<&str> = report.excluded.iter().map(|(id, _)| id.as_str()).collect();

            let ranked = rank(scorer.score(&scan, &report.survivors), 20);
            for m in &ranked {
                assert!(
                    !excluded.contains(m.product_id.as_str()),
                    "{} resurrected {}",
                    scorer.name(),
                    m.product.name
                );
            }
        }
    }
}
