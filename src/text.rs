// src/text.rs
//! Text primitives shared by the gates, scorers and quality heuristics:
//! lowercase word splitting, prefix-tolerant root matching, phrase matching,
//! and the anonymized id used when logging scanned text.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)[\p{L}\p{N}]+").expect("word regex"));

/// Filler words that never count as a signal on their own.
pub const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "of", "a", "an", "in", "to", "by", "on", "new",
];

/// Lowercased alphanumeric words, in order.
pub fn words(input: &str) -> Vec<String> {
    RE_WORD
        .find_iter(input)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Lowercase, collapse every non-alphanumeric run into one space.
pub fn normalize(input: &str) -> String {
    words(input).join(" ")
}

/// Words worth comparing: longer than two chars and not a stopword.
pub fn meaningful_words(input: &str) -> Vec<String> {
    words(input)
        .into_iter()
        .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// True if some word starts with `root` (tolerates plurals and suffixes).
pub fn has_root(words: &[String], root: &str) -> bool {
    !root.is_empty() && words.iter().any(|w| w.starts_with(root))
}

/// Roots from `vocabulary` present as a word prefix, in vocabulary order.
pub fn roots_present<'a, S: AsRef<str>>(words: &[String], vocabulary: &'a [S]) -> Vec<&'a str> {
    vocabulary
        .iter()
        .map(|r| r.as_ref())
        .filter(|r| has_root(words, r))
        .collect()
}

/// Phrase match: every phrase word must appear, contiguously, each as a word prefix.
/// A single-word phrase degrades to `has_root`.
pub fn has_phrase(words: &[String], phrase: &str) -> bool {
    let parts: Vec<String> = self::words(phrase);
    match parts.len() {
        0 => false,
        1 => has_root(words, &parts[0]),
        n => words.windows(n).any(|win| {
            win.iter()
                .zip(parts.iter())
                .all(|(w, p)| w.starts_with(p.as_str()))
        }),
    }
}

/// True if `word` is `base` or a plain plural of it (`-s`, `-es`, `-y` to `-ies`).
pub fn is_word_or_plural(word: &str, base: &str) -> bool {
    if base.is_empty() {
        return false;
    }
    if word == base {
        return true;
    }
    if let Some(rest) = word.strip_prefix(base) {
        return rest == "s" || rest == "es";
    }
    base.strip_suffix('y')
        .is_some_and(|stem| word.strip_prefix(stem) == Some("ies"))
}

/// Phrase match on whole words: contiguous, each word equal to the phrase word or
/// its plural. `case` matches "cases" but not "casein".
pub fn has_whole_phrase(words: &[String], phrase: &str) -> bool {
    let parts: Vec<String> = self::words(phrase);
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }
    words.windows(parts.len()).any(|win| {
        win.iter()
            .zip(parts.iter())
            .all(|(w, p)| is_word_or_plural(w, p))
    })
}

/// Short anonymized id for logging text without logging the text itself.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Ensure ASCII-only, single line, and <=160 chars. Collapses whitespace.
pub fn sanitize_field(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(160));
    let mut prev_space = false;
    for ch in input.chars() {
        let c = match ch {
            '\r' | '\n' | '\t' => ' ',
            c if c.is_ascii() => c,
            _ => ' ',
        };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
        if out.len() >= 160 {
            break;
        }
    }
    out.trim().to_string()
}

/// Clamp to [0.0, 1.0]; NaN collapses to 0.0.
pub fn clamp01(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_split_on_punctuation() {
        assert_eq!(
            words("Purell® Advanced Hand-Sanitizer, 8 fl.oz"),
            vec!["purell", "advanced", "hand", "sanitizer", "8", "fl", "oz"]
        );
    }

    #[test]
    fn roots_tolerate_plurals() {
        let w = words("Facial Towelettes");
        assert!(has_root(&w, "towelette"));
        assert!(!has_root(&w, "wash"));
        assert_eq!(roots_present(&w, &["wash", "towelette"]), vec!["towelette"]);
    }

    #[test]
    fn phrases_are_contiguous() {
        let w = words("Gentle Hand Wash");
        assert!(has_phrase(&w, "hand wash"));
        assert!(!has_phrase(&w, "wash hand"));
        assert!(!has_phrase(&w, ""));
    }

    #[test]
    fn whole_phrases_need_whole_words() {
        let w = words("Stool Softener Casein Cases");
        assert!(!has_whole_phrase(&w, "tool"));
        assert!(!has_whole_phrase(&w, "casein protein"));
        assert!(has_whole_phrase(&w, "case"));
        assert!(is_word_or_plural("accessories", "accessory"));
        assert!(is_word_or_plural("brushes", "brush"));
        assert!(!is_word_or_plural("casein", "case"));
        assert!(!has_whole_phrase(&w, ""));
    }

    #[test]
    fn sanitize_collapses_and_caps() {
        let s = sanitize_field("  Shea\tButter\n\nLotion  ");
        assert_eq!(s, "Shea Butter Lotion");
        assert!(sanitize_field(&"x".repeat(500)).len() <= 160);
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("hand sanitizer");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("hand sanitizer"));
    }
}
