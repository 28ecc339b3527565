//! PPTX deck writer: loads a presentation template and composes slide
//! records into it.
//!
//! Template parts other than slides are carried over as-is, and the
//! template's slides are replaced by the generated ones.

pub mod layout;
pub mod package;
pub mod template;
pub mod writer;

pub use layout::{Rect, SlideGeometry};
pub use template::{Placeholder, SlideLayout, Template};
pub use writer::{ComposeOptions, ComposeReport, DeckComposer};
