//! DOCX (Office Open XML) extraction backend.
//!
//! Reads `.docx` files, which are ZIP archives of XML parts, into an ordered
//! list of paragraphs, images and tables.

pub mod extractor;

pub use extractor::DocxExtractor;
