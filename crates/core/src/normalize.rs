//! Text normalization for LLM responses and fuzzy comparison.
//!
//! Handles line-ending and whitespace cleanup of model output, bullet and
//! title markup stripping, and the canonical form used when comparing
//! titles, bullets and file names.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse runs of horizontal whitespace into one space.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());

/// Regex matching runs of non-word characters, used for file-name stems.
static NON_WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

/// Characters that introduce a bullet point in model output.
const BULLET_CHARS: &[char] = &['-', '•', '*', '–', '—', '·', '▪', '◦'];

/// Normalize a string for comparison purposes.
///
/// Applies NFKC, converts to lowercase, removes punctuation and collapses
/// whitespace.
pub fn normalize_for_comparison(text: &str) -> String {
    text.nfkc()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join the whitespace-separated words of `text` with single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove leading bullet or dash characters from a line.
pub fn strip_bullet(line: &str) -> &str {
    line.trim().trim_start_matches(BULLET_CHARS).trim_start()
}

/// Remove bold (`**`) and heading (`#`) markup around a title line.
pub fn strip_title_markup(line: &str) -> &str {
    line.trim().trim_matches(|c: char| c == '*' || c == '#' || c.is_whitespace())
}

/// Turn free text into a file-name-safe stem (`Fig. 3 Sales` → `Fig_3_Sales`).
pub fn sanitize_file_stem(text: &str) -> String {
    NON_WORD_REGEX
        .replace_all(text.trim(), "_")
        .trim_matches('_')
        .to_string()
}

/// Lowercase words of `text`, split on non-word characters.
pub fn words_lowercase(text: &str) -> Vec<String> {
    NON_WORD_REGEX
        .split(&text.to_lowercase())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text normalizer for raw LLM responses.
///
/// Line breaks are kept; whitespace inside each line is collapsed.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    /// Create a new text normalizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a block of text.
    ///
    /// - Converts `\r\n` and `\r` to `\n`
    /// - Applies NFKC so typographic spaces and ligatures compare equal
    /// - Collapses whitespace runs to single spaces
    /// - Trims leading/trailing whitespace of every line
    pub fn normalize_line(&self, text: &str) -> String {
        let result = text.replace("\r\n", "\n").replace('\r', "\n");
        let result: String = result.nfkc().collect();

        result
            .lines()
            .map(|line| {
                let collapsed = WHITESPACE_COLLAPSE_REGEX.replace_all(line, " ");
                collapsed.trim().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Normalize text and split it into lines, keeping blank lines as empty
    /// strings so callers can still see paragraph breaks.
    pub fn normalize_to_lines(&self, text: &str) -> Vec<String> {
        let normalized = self.normalize_line(text);

        normalized.lines().map(|l| l.trim().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_for_comparison() {
        assert_eq!(normalize_for_comparison("AI in Healthcare"), "ai in healthcare");
        assert_eq!(normalize_for_comparison("Ai In Healthcare "), "ai in healthcare");
        assert_eq!(
            normalize_for_comparison("  Results:   Phase\t2!  "),
            "results phase 2"
        );
    }

    #[test]
    fn test_strip_bullet() {
        assert_eq!(strip_bullet("- First point"), "First point");
        assert_eq!(strip_bullet("• Second point"), "Second point");
        assert_eq!(strip_bullet("  * Third"), "Third");
        assert_eq!(strip_bullet("-- dashed"), "dashed");
        assert_eq!(strip_bullet("Plain line"), "Plain line");
    }

    #[test]
    fn test_strip_title_markup() {
        assert_eq!(strip_title_markup("**AI in Healthcare**"), "AI in Healthcare");
        assert_eq!(strip_title_markup("## Overview"), "Overview");
        assert_eq!(strip_title_markup("** **"), "");
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("Fig. 3 Sales by region"), "Fig_3_Sales_by_region");
        assert_eq!(sanitize_file_stem("  (draft)  "), "draft");
    }

    #[test]
    fn test_words_lowercase() {
        assert_eq!(
            words_lowercase("Machine-Learning in Practice"),
            vec!["machine", "learning", "in", "practice"]
        );
        assert!(words_lowercase("  ").is_empty());
    }

    #[test]
    fn test_normalize_line_endings_and_spaces() {
        let normalizer = TextNormalizer::new();
        assert_eq!(
            normalizer.normalize_line("**Title**\r\n-   one\t two\r- three"),
            "**Title**\n- one two\n- three"
        );
    }

    #[test]
    fn test_normalize_keeps_line_breaks() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize_line("Line one\n  Line   two"), "Line one\nLine two");
    }

    #[test]
    fn test_normalize_to_lines_keeps_blank_lines() {
        let normalizer = TextNormalizer::new();
        let lines = normalizer.normalize_to_lines("A\n\n  B  ");
        assert_eq!(lines, vec!["A", "", "B"]);
    }

    #[test]
    fn test_non_breaking_space_collapses() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize_line("a\u{00A0}\u{00A0}b"), "a b");
    }
}
