// src/analyze/frames.rs
//! Multi-frame text accumulation: a bounded buffer of distinct OCR fragments with a
//! restart-on-activity debounce. Time is supplied by the caller.

use std::time::{Duration, Instant};

use strsim::normalized_levenshtein;

use crate::text;

/// Fragments at least this similar are the same text read twice.
const DUPLICATE_SIMILARITY: f64 = 0.90;

#[derive(Debug, Clone)]
pub struct FrameAccumulator {
    capacity: usize,
    debounce: Duration,
    fragments: Vec<String>,
    last_activity: Option<Instant>,
}

impl FrameAccumulator {
    pub fn new(capacity: usize, debounce: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            debounce,
            fragments: Vec::new(),
            last_activity: None,
        }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Offer one fragment. Returns true if it was kept (new, or replacing a shorter
    /// fragment it contains); kept fragments restart the debounce timer.
    pub fn push(&mut self, fragment: &str, now: Instant) -> bool {
        let fragment = fragment.trim();
        let words = text::words(fragment);
        if words.is_empty() {
            return false;
        }
        let norm = words.join(" ");

        let mut replaced = false;
        let mut i = 0;
        while i < self.fragments.len() {
            let existing_words = text::words(&self.fragments[i]);
            let existing = existing_words.join(" ");
            if contains_words(&existing_words, &words)
                || normalized_levenshtein(&existing, &norm) >= DUPLICATE_SIMILARITY
            {
                return false;
            }
            if contains_words(&words, &existing_words) {
                if replaced {
                    self.fragments.remove(i);
                    continue;
                }
                self.fragments[i] = fragment.to_string();
                replaced = true;
            }
            i += 1;
        }

        if !replaced {
            if self.fragments.len() >= self.capacity {
                return false;
            }
            self.fragments.push(fragment.to_string());
        }
        self.last_activity = Some(now);
        true
    }

    /// Full, or non-empty and idle for at least the debounce interval.
    pub fn is_ready(&self, now: Instant) -> bool {
        if self.fragments.len() >= self.capacity {
            return true;
        }
        match self.last_activity {
            Some(at) if !self.fragments.is_empty() => now.saturating_duration_since(at) >= self.debounce,
            _ => false,
        }
    }

    /// Drain the buffer into one string, fragments in arrival order.
    pub fn finalize(&mut self) -> String {
        self.last_activity = None;
        std::mem::take(&mut self.fragments).join(" ")
    }
}

/// `needle` appears in `haystack` as a contiguous run of whole words.
fn contains_words(haystack: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}
