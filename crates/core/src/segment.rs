//! Topic parsing and topic-based segmentation of the document text.

use crate::locate::MarkerLocator;
use crate::normalize::{collapse_whitespace, strip_title_markup};
use crate::types::{Segment, Topic};

/// Default number of words per fallback chunk.
pub const DEFAULT_CHUNK_WORDS: usize = 1500;

/// Characters trimmed from both ends of a marker excerpt.
const MARKER_QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’', '`'];

/// Parse the topic list returned by the LLM.
///
/// A line wrapped in `**` opens a topic; the plain lines that follow, up to
/// the next bold line, form its marker. Lines before the first topic and
/// topics with an empty name are ignored.
pub fn parse_topics(response: &str) -> Vec<Topic> {
    let mut topics = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if is_bold_line(line) {
            if let Some((name, marker)) = current.take() {
                push_topic(&mut topics, name, &marker);
            }
            current = Some((strip_title_markup(line).to_string(), Vec::new()));
        } else if let Some((_, marker)) = current.as_mut() {
            marker.push(line.to_string());
        }
    }
    if let Some((name, marker)) = current {
        push_topic(&mut topics, name, &marker);
    }

    log::debug!("Parsed {} topics", topics.len());
    topics
}

fn is_bold_line(line: &str) -> bool {
    line.len() >= 4 && line.starts_with("**") && line.ends_with("**")
}

fn push_topic(topics: &mut Vec<Topic>, name: String, marker_lines: &[String]) {
    if name.is_empty() {
        return;
    }
    let marker = collapse_whitespace(&marker_lines.join(" "));
    let marker = marker
        .trim_matches(MARKER_QUOTES)
        .trim_end_matches("...")
        .trim_end_matches('…')
        .trim_matches(MARKER_QUOTES)
        .trim()
        .to_string();
    topics.push(Topic::new(name, marker));
}

/// Split `text` into one segment per locatable topic.
///
/// A topic's segment runs from its marker to the next topic's marker, or to
/// the end of the text when there is no next topic or its marker cannot be
/// found. Topics whose own marker cannot be found are dropped, as are spans
/// where start >= end.
pub fn segment_text<L>(text: &str, topics: &[Topic], locator: &L) -> Vec<Segment>
where
    L: MarkerLocator + ?Sized,
{
    let mut segments = Vec::new();

    for (i, topic) in topics.iter().enumerate() {
        let Some(start) = locator.locate(text, &topic.marker) else {
            log::warn!("Skipping topic '{}': marker not found", topic.name);
            continue;
        };

        let end = topics
            .get(i + 1)
            .and_then(|next| locator.locate(text, &next.marker))
            .map_or(text.len(), |m| m.offset);

        if start.offset >= end {
            log::warn!(
                "Skipping topic '{}': marker at {} is not before the next one at {}",
                topic.name,
                start.offset,
                end
            );
            continue;
        }

        let content = text[start.offset..end].trim();
        if content.is_empty() {
            continue;
        }
        segments.push(Segment {
            topic: topic.name.clone(),
            content: content.to_string(),
        });
    }

    segments
}

/// Split `text` into consecutive untitled segments of at most `max_words`
/// words each.
pub fn chunk_by_words(text: &str, max_words: usize) -> Vec<Segment> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(|chunk| Segment {
            topic: String::new(),
            content: chunk.join(" "),
        })
        .collect()
}
