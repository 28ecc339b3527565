//! Slide planning: from an extracted document to the final list of slides.
//!
//! The planner drives the LLM through a [`TextGenerator`], so it can run
//! against a real endpoint or a scripted fake.

use crate::assign::{AssignmentPolicy, ImageAssigner, UsedImages};
use crate::error::Result;
use crate::locate::{FuzzyWindowLocator, MarkerLocator};
use crate::prompt::{
    format_prompt, EXTRACT_TOPICS_TEMPLATE, SLIDE_CONTENT_TEMPLATE, STRUCTURED_SLIDES_TEMPLATE,
};
use crate::segment::{chunk_by_words, parse_topics, segment_text, DEFAULT_CHUNK_WORDS};
use crate::slides::{DuplicateFilter, ParseOutcome, SlideContentParser};
use crate::types::{ContentBlock, Segment, SlideRecord, SourceDocument, Topic};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Title of the slide generated for each extracted table.
pub const SUMMARY_TABLE_TITLE: &str = "Summary Table";

/// Source of LLM completions.
pub trait TextGenerator {
    /// Send one prompt and return the reply text.
    fn generate(&self, prompt: &str) -> Result<String>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }
}

/// How the document is turned into prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// Topic extraction, segmentation, then one bullet prompt per segment.
    #[default]
    Topics,
    /// Topic segmentation, then one JSON prompt per segment listing the
    /// images and tables the model may place.
    Structured,
    /// One bullet prompt per paragraph; an image right after a paragraph is
    /// suggested for its first slide.
    Paragraphs,
}

/// Settings for one planning run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: PlanMode,

    /// Words per fallback chunk when no topic segment can be located.
    pub chunk_words: usize,

    /// Append a "Summary Table" slide per extracted table (ignored in
    /// structured mode, where the model places tables itself).
    pub summary_tables: bool,

    pub images: AssignmentPolicy,
    pub duplicates: DuplicateFilter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PlanMode::default(),
            chunk_words: DEFAULT_CHUNK_WORDS,
            summary_tables: true,
            images: AssignmentPolicy::default(),
            duplicates: DuplicateFilter::default(),
        }
    }
}

/// Everything a planning run produced, kept for the intermediate artifacts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SlidePlan {
    pub topics: Vec<Topic>,
    pub segments: Vec<Segment>,
    /// Raw LLM replies for the slide prompts, in request order.
    pub responses: Vec<String>,
    pub slides: Vec<SlideRecord>,
}

/// Plans the slides of a deck.
pub struct SlidePlanner<G, L = FuzzyWindowLocator> {
    generator: G,
    locator: L,
    parser: SlideContentParser,
    config: PipelineConfig,
}

impl<G: TextGenerator> SlidePlanner<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            locator: FuzzyWindowLocator::default(),
            parser: SlideContentParser::new(),
            config: PipelineConfig::default(),
        }
    }
}

impl<G: TextGenerator, L: MarkerLocator> SlidePlanner<G, L> {
    /// Replace the marker locator used for segmentation.
    pub fn with_locator<M: MarkerLocator>(self, locator: M) -> SlidePlanner<G, M> {
        SlidePlanner {
            generator: self.generator,
            locator,
            parser: self.parser,
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.parser = SlideContentParser::new().with_duplicate_filter(config.duplicates);
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole plan for `document`.
    ///
    /// Failed, refused or malformed LLM replies skip their unit with a
    /// warning. Only unrecoverable errors (a missing credential) abort.
    pub fn plan(&self, document: &SourceDocument) -> Result<SlidePlan> {
        let mut plan = SlidePlan::default();

        match self.config.mode {
            PlanMode::Topics | PlanMode::Structured => self.plan_segments(document, &mut plan)?,
            PlanMode::Paragraphs => self.plan_paragraphs(document, &mut plan)?,
        }

        let generated = plan.slides.len();
        plan.slides = self.config.duplicates.filter(std::mem::take(&mut plan.slides));
        if plan.slides.len() < generated {
            log::info!(
                "Removed {} duplicate slides across the deck",
                generated - plan.slides.len()
            );
        }

        let assets = document.image_assets();
        let assigner = ImageAssigner::new(self.config.images);
        let mut used = UsedImages::new();
        assigner.claim_suggested(&mut plan.slides, &assets, &mut used);
        assigner.assign(&mut plan.slides, &assets, &mut used);
        log::info!("Placed {} of {} images", used.len(), assets.len());

        if self.config.summary_tables && self.config.mode != PlanMode::Structured {
            for rows in document.tables() {
                plan.slides.push(SlideRecord {
                    table: Some(rows.to_vec()),
                    ..SlideRecord::new(SUMMARY_TABLE_TITLE)
                });
            }
        }

        log::info!("Planned {} slides", plan.slides.len());
        Ok(plan)
    }

    fn plan_segments(&self, document: &SourceDocument, plan: &mut SlidePlan) -> Result<()> {
        let text = document.text();
        if text.trim().is_empty() {
            log::warn!("Document '{}' has no text", document.filename);
            return Ok(());
        }

        let topics_prompt = format_prompt(EXTRACT_TOPICS_TEMPLATE, &HashMap::from([("content", &text)]));
        if let Some(response) = self.ask("topic extraction", &topics_prompt)? {
            plan.topics = parse_topics(&response);
        }
        log::info!("Extracted {} topics", plan.topics.len());

        plan.segments = segment_text(&text, &plan.topics, &self.locator);
        if plan.segments.is_empty() {
            log::info!(
                "No topic could be located; splitting into {}-word chunks",
                self.config.chunk_words
            );
            plan.segments = chunk_by_words(&text, self.config.chunk_words);
        }

        let assets = document.image_assets();
        let image_list = serde_json::to_string_pretty(&assets)?;
        let table_data = serde_json::to_string_pretty(&document.tables())?;

        for (i, segment) in plan.segments.iter().enumerate() {
            let unit = if segment.topic.is_empty() {
                format!("chunk {}", i + 1)
            } else {
                format!("topic '{}'", segment.topic)
            };

            let prompt = match self.config.mode {
                PlanMode::Structured => format_prompt(
                    STRUCTURED_SLIDES_TEMPLATE,
                    &HashMap::from([
                        ("textContent", segment.content.as_str()),
                        ("imagePaths", image_list.as_str()),
                        ("tableData", table_data.as_str()),
                    ]),
                ),
                _ => slide_prompt(&segment.topic, &segment.content),
            };

            let Some(response) = self.ask(&unit, &prompt)? else {
                continue;
            };
            let outcome = match self.config.mode {
                PlanMode::Structured => match self.parser.parse_structured(&response) {
                    Ok(outcome) => Some(outcome),
                    Err(e) if e.is_recoverable() => {
                        log::warn!("Skipping {}: {}", unit, e);
                        None
                    }
                    Err(e) => return Err(e),
                },
                _ => Some(self.parser.parse(&response)),
            };
            plan.responses.push(response);

            match outcome {
                Some(ParseOutcome::Slides(slides)) => {
                    log::debug!("{} produced {} slides", unit, slides.len());
                    plan.slides.extend(slides);
                }
                Some(ParseOutcome::Refused) => log::warn!("Skipping {}: model refused", unit),
                None => {}
            }
        }

        Ok(())
    }

    fn plan_paragraphs(&self, document: &SourceDocument, plan: &mut SlidePlan) -> Result<()> {
        let blocks = &document.blocks;

        for (i, block) in blocks.iter().enumerate() {
            let ContentBlock::Paragraph { text } = block else {
                continue;
            };
            let unit = format!("paragraph {}", i + 1);
            let Some(response) = self.ask(&unit, &slide_prompt("", text))? else {
                continue;
            };
            let outcome = self.parser.parse(&response);
            plan.responses.push(response);

            let mut slides = match outcome {
                ParseOutcome::Slides(slides) => slides,
                ParseOutcome::Refused => {
                    log::warn!("Skipping {}: model refused", unit);
                    continue;
                }
            };
            if let (Some(first), Some(ContentBlock::Image { path, .. })) =
                (slides.first_mut(), blocks.get(i + 1))
            {
                first.image_path = Some(path.clone());
            }
            plan.slides.extend(slides);
        }

        Ok(())
    }

    /// Call the generator, turning recoverable failures into `None`.
    fn ask(&self, unit: &str, prompt: &str) -> Result<Option<String>> {
        log::debug!("Requesting {} ({} prompt chars)", unit, prompt.len());
        match self.generator.generate(prompt) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_recoverable() => {
                log::warn!("Skipping {}: {}", unit, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn slide_prompt(topic: &str, content: &str) -> String {
    format_prompt(
        SLIDE_CONTENT_TEMPLATE,
        &HashMap::from([("topic", topic), ("contentSegment", content)]),
    )
}
