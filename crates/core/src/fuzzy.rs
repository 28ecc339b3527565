//! Indel-based similarity scores on a 0–100 scale.
//!
//! `ratio` is `2 * M / (len(a) + len(b))` where `M` is the length of the
//! longest common subsequence, counted in chars. `partial_ratio` scores the
//! shorter string against windows of the longer one anchored at their common
//! blocks.

/// Similarity of two strings in `0.0..=1.0` (1.0 = identical).
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    indel_similarity(&a, &b)
}

/// Fuzzy ratio of two strings, rounded to `0..=100`.
///
/// Empty input on either side scores 0.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    to_score(similarity(a, b))
}

/// Best ratio of the shorter string against the windows of the longer one
/// that line up with a block the two strings share.
///
/// Rewards a short string that appears, nearly verbatim, anywhere inside a
/// long one.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if shorter.len() == longer.len() {
        return to_score(indel_similarity(shorter, longer));
    }

    let mut best = 0.0_f64;
    for (short_start, long_start, _) in matching_blocks(shorter, longer) {
        let start = long_start.saturating_sub(short_start);
        let end = (start + shorter.len()).min(longer.len());
        let score = indel_similarity(shorter, &longer[start..end]);
        if score > 0.995 {
            return 100;
        }
        best = best.max(score);
    }
    to_score(best)
}

fn indel_similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(a, b)) as f64 / total as f64
}

/// Length of the longest common subsequence.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (a, b) = if a.len() < b.len() { (b, a) } else { (a, b) };
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];

    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Longest common substring as `(start in a, start in b, len)`.
///
/// Ties keep the block that starts first in `a`, then first in `b`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let len = cur[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

/// Non-overlapping common blocks of `a` and `b`, in order.
///
/// Takes the longest block, then recurses into the regions on either side.
fn matching_blocks(a: &[char], b: &[char]) -> Vec<(usize, usize, usize)> {
    let mut blocks = Vec::new();
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, len) = longest_common_block(&a[a_lo..a_hi], &b[b_lo..b_hi]);
        if len == 0 {
            continue;
        }
        let (i, j) = (a_lo + i, b_lo + j);
        blocks.push((i, j, len));

        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + len < a_hi && j + len < b_hi {
            pending.push((i + len, a_hi, j + len, b_hi));
        }
    }

    blocks.sort_unstable();
    blocks
}

fn to_score(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_bounds() {
        assert_eq!(ratio("introduction to ai", "introduction to ai"), 100);
        assert_eq!(ratio("", "anything"), 0);
        assert_eq!(ratio("abc", "xyz"), 0);
    }

    #[test]
    fn test_ratio_counts_matching_chars() {
        assert_eq!(ratio("this is a test", "this is a test!"), 97);
        assert_eq!(ratio("fuzzy wuzzy was a bear", "wuzzy fuzzy was a bear"), 91);
    }

    #[test]
    fn test_ratio_tolerates_reworded_marker() {
        let score = ratio(
            "phase two of the project focused on evaluating the accuracy of models",
            "the second phase of the project focused on evaluating model accuracy across",
        );
        assert_eq!(score, 78);
    }

    #[test]
    fn test_ratio_tolerates_small_edits() {
        let score = ratio(
            "introduction to ai systems and their",
            "introduction to al systems and thier",
        );
        assert!(score > 90, "score was {score}");
    }

    #[test]
    fn test_ratio_is_char_based() {
        assert_eq!(ratio("café", "cafe"), 75);
    }

    #[test]
    fn test_partial_ratio_finds_substring() {
        assert_eq!(partial_ratio("sales", "quarterly sales report"), 100);
        assert_eq!(partial_ratio("quarterly sales report", "sales"), 100);
        assert!(partial_ratio("revenue", "quarterly sales report") < 70);
    }

    #[test]
    fn test_partial_ratio_empty() {
        assert_eq!(partial_ratio("", "text"), 0);
        assert_eq!(partial_ratio("abc", "xyz uvw"), 0);
    }

    #[test]
    fn test_partial_ratio_long_inputs() {
        let caption = "figure 4. distribution of model accuracy across the participating \
                       hospitals during the second phase of the evaluation, by department";
        let mut slide = String::new();
        for i in 0..40 {
            slide.push_str(&format!("bullet {i} about staffing and budget planning. "));
        }
        slide.push_str(caption);

        assert_eq!(partial_ratio(&slide, caption), 100);
        assert!(partial_ratio(&slide[..600], caption) < 70);
    }

    #[test]
    fn test_matching_blocks_are_ordered_and_disjoint() {
        let a: Vec<char> = "abxcd".chars().collect();
        let b: Vec<char> = "abcd".chars().collect();
        assert_eq!(matching_blocks(&a, &b), vec![(0, 0, 2), (3, 2, 2)]);
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("same", "same"), 1.0);
        assert!(similarity("ai in healthcare", "ai in health care") > 0.85);
        assert!(similarity("ai in healthcare", "market overview") < 0.5);
    }
}
