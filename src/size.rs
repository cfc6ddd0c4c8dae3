// src/size.rs
//! Package size extraction from label text and size compatibility scoring.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{ParsedSize, SizeUnit};

// number + unit; "fl oz" must win over a bare "oz"
static RE_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d+(?:[.,]\d+)?)\s*(fl\.?\s*oz|ml|kg|lbs?|oz|ct|count|pk|pack|g|l)\b",
    )
    .expect("size regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Volume,
    Mass,
    Count,
}

impl SizeUnit {
    fn dimension(self) -> Dimension {
        match self {
            SizeUnit::Milliliter | SizeUnit::Liter | SizeUnit::FluidOunce => Dimension::Volume,
            SizeUnit::Gram | SizeUnit::Kilogram | SizeUnit::Pound => Dimension::Mass,
            // labels use "oz" for both; compare it as a volume
            SizeUnit::Ounce => Dimension::Volume,
            SizeUnit::Count => Dimension::Count,
        }
    }

    /// Factor to the dimension's base unit (ml, g, count).
    fn base_factor(self) -> f64 {
        match self {
            SizeUnit::Milliliter => 1.0,
            SizeUnit::Liter => 1000.0,
            SizeUnit::FluidOunce | SizeUnit::Ounce => 29.5735,
            SizeUnit::Gram => 1.0,
            SizeUnit::Kilogram => 1000.0,
            SizeUnit::Pound => 453.592,
            SizeUnit::Count => 1.0,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let compact: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_lowercase();
        Some(match compact.as_str() {
            "floz" => SizeUnit::FluidOunce,
            "oz" => SizeUnit::Ounce,
            "ml" => SizeUnit::Milliliter,
            "l" => SizeUnit::Liter,
            "g" => SizeUnit::Gram,
            "kg" => SizeUnit::Kilogram,
            "lb" | "lbs" => SizeUnit::Pound,
            "ct" | "count" | "pk" | "pack" => SizeUnit::Count,
            _ => return None,
        })
    }
}

/// Compares two package sizes; 1.0 means the same size.
pub trait SizeComparator: Send + Sync {
    fn score_compatibility(&self, a: &ParsedSize, b: &ParsedSize) -> f32;
}

/// Regex-based default parser and comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeParser;

impl SizeParser {
    /// First `number + unit` token in the text.
    pub fn extract_size(text: &str) -> Option<ParsedSize> {
        RE_SIZE.captures_iter(text).find_map(|caps| {
            let value = caps.get(1)?.as_str().replace(',', ".").parse::<f64>().ok()?;
            let unit = SizeUnit::parse(caps.get(2)?.as_str())?;
            (value.is_finite() && value > 0.0).then_some(ParsedSize { value, unit })
        })
    }

    /// True if the text carries any size/unit token.
    pub fn has_size(text: &str) -> bool {
        Self::extract_size(text).is_some()
    }
}

impl SizeComparator for SizeParser {
    fn score_compatibility(&self, a: &ParsedSize, b: &ParsedSize) -> f32 {
        if a.unit.dimension() != b.unit.dimension() {
            return 0.3;
        }
        let x = a.value * a.unit.base_factor();
        let y = b.value * b.unit.base_factor();
        let (lo, hi) = if x <= y { (x, y) } else { (y, x) };
        if hi <= 0.0 {
            return 0.2;
        }
        let ratio = lo / hi;
        if ratio >= 0.95 {
            1.0
        } else if ratio >= 0.80 {
            0.8
        } else if ratio >= 0.50 {
            0.5
        } else {
            0.2
        }
    }
}
