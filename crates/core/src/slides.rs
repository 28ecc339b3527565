//! Parsing LLM slide output into [`SlideRecord`]s.
//!
//! Freeform responses go through a two-state line classifier: a title line
//! (`**Bold**` or `# Heading`) opens a slide, and the non-empty lines after it
//! become bullets until the next title. Structured responses are a JSON array
//! of `{title, text, image, table}` objects. Both paths drop noise slides and
//! consecutive near-duplicates.

use crate::error::{Error, Result};
use crate::fuzzy;
use crate::normalize::{normalize_for_comparison, strip_bullet, strip_title_markup, TextNormalizer};
use crate::types::{SlideRecord, UNTITLED};
use serde::Deserialize;
use std::collections::HashSet;

/// Phrases that mark a response as a refusal rather than slide content.
pub const REFUSAL_PHRASES: &[&str] = &[
    "I cannot create meaningful slides",
    "I would need more detailed information",
    "please provide a document portion",
    "only contains a title with no actual content",
    "Sorry, but the provided document portion",
    "I'll be happy to create relevant slides",
];

/// Whether a response is an apology/refusal that must be skipped whole.
pub fn is_refusal(response: &str) -> bool {
    let lowered = response.to_lowercase();
    REFUSAL_PHRASES
        .iter()
        .any(|phrase| lowered.contains(&phrase.to_lowercase()))
}

/// Result of parsing one LLM response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The response was parsed; the list may be empty.
    Slides(Vec<SlideRecord>),
    /// The response was a refusal and was discarded unparsed.
    Refused,
}

impl ParseOutcome {
    /// The parsed slides, or an empty list for a refusal.
    pub fn into_slides(self) -> Vec<SlideRecord> {
        match self {
            ParseOutcome::Slides(slides) => slides,
            ParseOutcome::Refused => Vec::new(),
        }
    }
}

/// Classification of one response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Title(&'a str),
    Bullet(&'a str),
    Blank,
}

fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if line.is_empty() {
        LineKind::Blank
    } else if line.starts_with("**") || line.starts_with('#') {
        LineKind::Title(strip_title_markup(line))
    } else {
        LineKind::Bullet(strip_bullet(line))
    }
}

/// Parser state: either no slide is open yet, or bullets are being collected.
#[derive(Debug)]
enum ParserState {
    AwaitingTitle,
    InBullets(SlideRecord),
}

/// Parser for freeform and structured slide responses.
#[derive(Debug, Clone, Default)]
pub struct SlideContentParser {
    normalizer: TextNormalizer,
    duplicates: DuplicateFilter,
}

impl SlideContentParser {
    pub fn new() -> Self {
        Self {
            normalizer: TextNormalizer::new(),
            duplicates: DuplicateFilter::default(),
        }
    }

    /// Replace the duplicate filter.
    pub fn with_duplicate_filter(mut self, filter: DuplicateFilter) -> Self {
        self.duplicates = filter;
        self
    }

    /// Parse a freeform response of title lines followed by bullet lines.
    pub fn parse(&self, response: &str) -> ParseOutcome {
        if is_refusal(response) {
            log::warn!("Discarding refusal response");
            return ParseOutcome::Refused;
        }

        let mut records = Vec::new();
        let mut state = ParserState::AwaitingTitle;

        for line in self.normalizer.normalize_to_lines(response) {
            state = match (state, classify(&line)) {
                (ParserState::AwaitingTitle, LineKind::Title(title)) => {
                    ParserState::InBullets(new_record(title))
                }
                (ParserState::InBullets(done), LineKind::Title(title)) => {
                    records.push(done);
                    ParserState::InBullets(new_record(title))
                }
                (ParserState::InBullets(mut open), LineKind::Bullet(text)) => {
                    if !text.is_empty() {
                        open.add_bullet(text);
                    }
                    ParserState::InBullets(open)
                }
                (state, LineKind::Bullet(_)) | (state, LineKind::Blank) => state,
            };
        }
        if let ParserState::InBullets(last) = state {
            records.push(last);
        }

        ParseOutcome::Slides(self.finish(records))
    }

    /// Parse a structured response: a JSON array of slide objects.
    ///
    /// Surrounding prose or code fences are ignored; anything that does not
    /// contain a valid array is [`Error::MalformedResponse`].
    pub fn parse_structured(&self, response: &str) -> Result<ParseOutcome> {
        if is_refusal(response) {
            log::warn!("Discarding refusal response");
            return Ok(ParseOutcome::Refused);
        }

        let raw = find_slide_array(response)?;

        let records = raw.into_iter().map(RawSlide::into_record).collect();
        Ok(ParseOutcome::Slides(self.finish(records)))
    }

    fn finish(&self, records: Vec<SlideRecord>) -> Vec<SlideRecord> {
        let kept: Vec<SlideRecord> = records.into_iter().filter(|r| !r.is_noise()).collect();
        self.duplicates.filter(kept)
    }
}

fn new_record(title: &str) -> SlideRecord {
    if title.is_empty() {
        SlideRecord::new(UNTITLED)
    } else {
        SlideRecord::new(title)
    }
}

/// First slide array in `response`, trying each `[` in turn.
///
/// Text after the array is ignored. An empty array is only returned when no
/// later `[` starts a non-empty one.
fn find_slide_array(response: &str) -> Result<Vec<RawSlide>> {
    let mut first_error = None;
    let mut empty = None;

    for (start, _) in response.match_indices('[') {
        let mut values =
            serde_json::Deserializer::from_str(&response[start..]).into_iter::<Vec<RawSlide>>();
        match values.next() {
            Some(Ok(raw)) if raw.is_empty() => {
                empty.get_or_insert(raw);
            }
            Some(Ok(raw)) => return Ok(raw),
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            None => {}
        }
    }

    match (empty, first_error) {
        (Some(raw), _) => Ok(raw),
        (None, Some(e)) => Err(e.into()),
        (None, None) => Err(Error::MalformedResponse(
            "response does not contain a JSON array".to_string(),
        )),
    }
}

/// One slide object as the model writes it.
#[derive(Debug, Deserialize)]
struct RawSlide {
    #[serde(default)]
    title: String,
    #[serde(default, alias = "bullets")]
    text: RawText,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    table: Option<Vec<Vec<serde_json::Value>>>,
}

/// Bullet text, either newline-joined or already a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawText {
    Joined(String),
    Lines(Vec<String>),
}

impl Default for RawText {
    fn default() -> Self {
        RawText::Joined(String::new())
    }
}

impl RawSlide {
    fn into_record(self) -> SlideRecord {
        let lines: Vec<String> = match self.text {
            RawText::Joined(text) => text.lines().map(str::to_string).collect(),
            RawText::Lines(lines) => lines,
        };

        let mut record = new_record(strip_title_markup(&self.title));
        for line in &lines {
            let bullet = strip_bullet(line);
            if !bullet.is_empty() {
                record.add_bullet(bullet);
            }
        }

        record.image_path = self
            .image
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        record.table = self
            .table
            .map(|rows| {
                rows.into_iter()
                    .map(|row| row.into_iter().map(cell_text).collect::<Vec<_>>())
                    .filter(|row| !row.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|rows| !rows.is_empty());

        record
    }
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Drops a slide that repeats the slide kept just before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateFilter {
    /// Titles more similar than this (0.0–1.0) are duplicates.
    pub title_similarity: f64,

    /// Share of the later slide's bullets also on the earlier slide above
    /// which the slides are duplicates.
    pub bullet_overlap: f64,
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self {
            title_similarity: 0.85,
            bullet_overlap: 0.5,
        }
    }
}

impl DuplicateFilter {
    /// Whether `next` duplicates `prev`.
    pub fn is_duplicate(&self, prev: &SlideRecord, next: &SlideRecord) -> bool {
        let title_score = fuzzy::similarity(
            &normalize_for_comparison(&prev.title),
            &normalize_for_comparison(&next.title),
        );
        if title_score > self.title_similarity {
            return true;
        }

        let prev_bullets: HashSet<String> =
            prev.bullets.iter().map(|b| normalize_for_comparison(b)).collect();
        let next_bullets: HashSet<String> =
            next.bullets.iter().map(|b| normalize_for_comparison(b)).collect();
        let shared = next_bullets.intersection(&prev_bullets).count() as f64;
        let overlap = shared / next.bullets.len().max(1) as f64;

        overlap > self.bullet_overlap
    }

    /// Remove every slide that duplicates the last slide kept before it.
    pub fn filter(&self, slides: Vec<SlideRecord>) -> Vec<SlideRecord> {
        let mut kept: Vec<SlideRecord> = Vec::with_capacity(slides.len());
        for slide in slides {
            if let Some(prev) = kept.last() {
                if self.is_duplicate(prev, &slide) {
                    log::debug!("Dropping duplicate slide '{}'", slide.title);
                    continue;
                }
            }
            kept.push(slide);
        }
        kept
    }
}

/// Parse a structured response with the default parser settings.
pub fn parse_structured_slides(response: &str) -> Result<ParseOutcome> {
    SlideContentParser::default().parse_structured(response)
}

/// Apply the default duplicate rule across a whole deck.
pub fn dedup_slides(slides: Vec<SlideRecord>) -> Vec<SlideRecord> {
    DuplicateFilter::default().filter(slides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structured_slides_free_function() {
        let slides = parse_structured_slides(r#"[{"title":"Scope","text":"In\nOut"}]"#)
            .unwrap()
            .into_slides();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].bullets, vec!["In", "Out"]);
        assert!(parse_structured_slides("no array here").is_err());
    }

    fn parse(text: &str) -> Vec<SlideRecord> {
        SlideContentParser::new().parse(text).into_slides()
    }

    #[test]
    fn test_titles_and_bullets() {
        let slides = parse(
            "**AI Overview**\n- Machine learning basics\n- Deep learning\n\n\
             **Applications**\n• Healthcare diagnostics\n• Fraud detection\n• Tutoring",
        );
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].title, "AI Overview");
        assert_eq!(slides[0].bullets, vec!["Machine learning basics", "Deep learning"]);
        assert_eq!(slides[1].title, "Applications");
        assert_eq!(slides[1].bullets.len(), 3);
    }

    #[test]
    fn test_lines_before_first_title_are_ignored() {
        let slides = parse("Here are your slides:\n**Market**\nGrowth 12%\nNew entrants");
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].title, "Market");
        assert_eq!(slides[0].bullets, vec!["Growth 12%", "New entrants"]);
    }

    #[test]
    fn test_markdown_heading_is_a_title() {
        let slides = parse("## Results\n- Accuracy rose\n- Costs fell");
        assert_eq!(slides[0].title, "Results");
    }

    #[test]
    fn test_untitled_with_single_bullet_is_discarded() {
        let slides = parse("** **\n- lonely bullet\n**Real**\n- a\n- b");
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].title, "Real");
    }

    #[test]
    fn test_untitled_with_several_bullets_is_kept() {
        let slides = parse("****\n- a\n- b");
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].title, UNTITLED);
    }

    #[test]
    fn test_refusal_is_skipped_whole() {
        let outcome = SlideContentParser::new()
            .parse("**Slide**\n- x\nSorry, but the provided document portion is empty.");
        assert_eq!(outcome, ParseOutcome::Refused);
        assert!(is_refusal("i cannot create meaningful slides from this"));
        assert!(!is_refusal("**Title**\n- fine"));
    }

    #[test]
    fn test_identical_consecutive_slides_drop_second() {
        let slides = parse("**Same**\n- a\n- b\n**Same**\n- a\n- b\n**Other**\n- c\n- d");
        let titles: Vec<_> = slides.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Same", "Other"]);
    }

    #[test]
    fn test_case_and_whitespace_title_variant_is_duplicate() {
        let filter = DuplicateFilter::default();
        let first = SlideRecord::new("AI in Healthcare").with_bullets(["Diagnostics", "Triage"]);
        let second = SlideRecord::new("Ai In Healthcare ").with_bullets(["Diagnostics", "Billing"]);
        assert!(filter.is_duplicate(&first, &second));
        assert_eq!(filter.filter(vec![first, second]).len(), 1);
    }

    #[test]
    fn test_bullet_overlap_alone_marks_duplicate() {
        let filter = DuplicateFilter::default();
        let first = SlideRecord::new("Costs").with_bullets(["a", "b", "c"]);
        let second = SlideRecord::new("Savings").with_bullets(["a", "b", "z"]);
        let third = SlideRecord::new("Risks").with_bullets(["a", "x", "y"]);
        assert!(filter.is_duplicate(&first, &second));
        assert!(!filter.is_duplicate(&first, &third));
    }

    #[test]
    fn test_comparison_is_against_last_kept() {
        let filter = DuplicateFilter::default();
        let slides = vec![
            SlideRecord::new("Topic").with_bullets(["a", "b"]),
            SlideRecord::new("Topic").with_bullets(["c", "d"]),
            SlideRecord::new("Different").with_bullets(["c", "d"]),
        ];
        let kept = filter.filter(slides);
        let titles: Vec<_> = kept.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Topic", "Different"]);
    }

    #[test]
    fn test_structured_response_with_fence() {
        let response = "```json\n[\n  {\"title\": \"Market Size\", \"text\": \"• Grew 10%\\n• Asia leads\", \
\"image\": \"images/img_1.png\", \"table\": []},\n  {\"title\": \"Regions\", \"text\": \"\", \"image\": \"\", \
\"table\": [[\"Region\", \"Share\"], [\"EU\", 0.3]]}\n]\n```";
        let slides = SlideContentParser::new()
            .parse_structured(response)
            .unwrap()
            .into_slides();

        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].bullets, vec!["Grew 10%", "Asia leads"]);
        assert_eq!(slides[0].image_path.as_deref(), Some("images/img_1.png"));
        assert_eq!(slides[0].table, None);
        assert_eq!(slides[1].image_path, None);
        assert_eq!(
            slides[1].table,
            Some(vec![
                vec!["Region".to_string(), "Share".to_string()],
                vec!["EU".to_string(), "0.3".to_string()],
            ])
        );
    }

    #[test]
    fn test_structured_bullets_as_list() {
        let slides = SlideContentParser::new()
            .parse_structured(r#"[{"title": "T", "bullets": ["- one", "- two"]}]"#)
            .unwrap()
            .into_slides();
        assert_eq!(slides[0].bullets, vec!["one", "two"]);
    }

    #[test]
    fn test_structured_array_after_bracketed_prose() {
        let response = "Slides [JSON] follow, see [1] and []:\n\
                        [{\"title\": \"Findings\", \"text\": \"- Costs fell\\n- Wait times fell\"}]\n\
                        Let me know if you need [more].";
        let slides = SlideContentParser::new()
            .parse_structured(response)
            .unwrap()
            .into_slides();

        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].title, "Findings");
        assert_eq!(slides[0].bullets, vec!["Costs fell", "Wait times fell"]);
    }

    #[test]
    fn test_structured_invalid_json_is_malformed() {
        let parser = SlideContentParser::new();
        assert!(matches!(
            parser.parse_structured("no json here"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parser.parse_structured("[{\"title\": }]"),
            Err(Error::MalformedResponse(_))
        ));
    }
}
