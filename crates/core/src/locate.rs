//! Locating topic markers inside the document text.

use crate::fuzzy;

/// Default minimum fuzzy score a window must exceed to count as a match.
pub const DEFAULT_MARKER_THRESHOLD: u8 = 70;

/// Where a marker was found and how confident the match is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerMatch {
    /// Byte offset into the searched text; always on a char boundary.
    pub offset: usize,

    /// Match score in `0..=100`; 100 for a verbatim match.
    pub score: u8,
}

/// Finds the start of a marker excerpt inside a larger text.
pub trait MarkerLocator {
    /// Return the match position, or `None` when the marker cannot be placed.
    fn locate(&self, text: &str, marker: &str) -> Option<MarkerMatch>;
}

/// Exact substring search with a fuzzy sliding-window fallback.
///
/// The fallback compares every run of `n` consecutive words of the text
/// (where `n` is the marker's word count) against the marker and keeps the
/// first best-scoring run.
#[derive(Debug, Clone)]
pub struct FuzzyWindowLocator {
    threshold: u8,
}

impl Default for FuzzyWindowLocator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MARKER_THRESHOLD,
        }
    }
}

impl FuzzyWindowLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the score a window must strictly exceed.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold.min(100);
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    fn best_window(&self, text: &str, marker: &str) -> Option<MarkerMatch> {
        let words = word_spans(text);
        let marker_words: Vec<&str> = marker.split_whitespace().collect();
        let n = marker_words.len();
        if n == 0 || words.len() < n {
            return None;
        }

        let target = marker_words.join(" ").to_lowercase();
        let mut best: Option<(usize, u8)> = None;

        for start in 0..=words.len() - n {
            let window = words[start..start + n]
                .iter()
                .map(|(_, w)| *w)
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            let score = fuzzy::ratio(&window, &target);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((start, score));
                if score == 100 {
                    break;
                }
            }
        }

        best.map(|(start, score)| MarkerMatch {
            offset: words[start].0,
            score,
        })
    }
}

impl MarkerLocator for FuzzyWindowLocator {
    fn locate(&self, text: &str, marker: &str) -> Option<MarkerMatch> {
        let marker = marker.trim();
        if marker.is_empty() {
            return None;
        }

        if let Some(offset) = text.find(marker) {
            return Some(MarkerMatch { offset, score: 100 });
        }

        match self.best_window(text, marker) {
            Some(found) if found.score > self.threshold => {
                log::debug!(
                    "Marker '{}' matched fuzzily at {} (score {})",
                    preview(marker),
                    found.offset,
                    found.score
                );
                Some(found)
            }
            best => {
                log::warn!(
                    "Could not find a good position for marker '{}' (best score: {})",
                    preview(marker),
                    best.map_or(0, |m| m.score)
                );
                None
            }
        }
    }
}

/// Whitespace-separated words of `text` with their starting byte offsets.
fn word_spans(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, &text[s..idx]));
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        spans.push((s, &text[s..]));
    }

    spans
}

/// First 30 characters of a marker, for log lines.
fn preview(marker: &str) -> String {
    let mut short: String = marker.chars().take(30).collect();
    if marker.chars().count() > 30 {
        short.push_str("...");
    }
    short
}
