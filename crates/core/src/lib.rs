//! Core domain types, topic segmentation, slide parsing, image assignment
//! and slide planning for document-to-deck conversion.

pub mod assign;
pub mod error;
pub mod fuzzy;
pub mod locate;
pub mod normalize;
pub mod outline;
pub mod pipeline;
pub mod prompt;
pub mod segment;
pub mod slides;
pub mod types;

pub use assign::{AssignmentPolicy, ImageAssigner, UsedImages};
pub use error::{Error, Result};
pub use locate::{FuzzyWindowLocator, MarkerLocator, MarkerMatch};
pub use normalize::TextNormalizer;
pub use outline::OutlineFormatter;
pub use pipeline::{PipelineConfig, PlanMode, SlidePlan, SlidePlanner, TextGenerator};
pub use prompt::format_prompt;
pub use slides::{
    dedup_slides, parse_structured_slides, DuplicateFilter, ParseOutcome, SlideContentParser,
};
pub use types::{
    ContentBlock, DocumentFormat, ImageAsset, Segment, SlideRecord, SourceDocument, Topic,
};
