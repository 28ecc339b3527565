//! Domain types for extracted documents and generated slides.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Title given to slides whose title line was empty.
pub const UNTITLED: &str = "Untitled";

/// An extracted source document with its content in reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Original filename (without path).
    pub filename: String,

    /// Detected format of the source file.
    pub format: DocumentFormat,

    /// Content blocks in document order.
    pub blocks: Vec<ContentBlock>,
}

impl SourceDocument {
    /// Create a new, empty document with the given filename and format.
    pub fn new(filename: impl Into<String>, format: DocumentFormat) -> Self {
        Self {
            filename: filename.into(),
            format,
            blocks: Vec::new(),
        }
    }

    /// Append a content block.
    pub fn add_block(&mut self, block: ContentBlock) {
        self.blocks.push(block);
    }

    /// Full document text: every paragraph joined by newlines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Paragraph { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// All images as assignable assets, in document order.
    pub fn image_assets(&self) -> Vec<ImageAsset> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Image { path, context } => Some(ImageAsset {
                    path: path.clone(),
                    context: context.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// All tables, in document order.
    pub fn tables(&self) -> Vec<&[Vec<String>]> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Table { rows } => Some(rows.as_slice()),
                _ => None,
            })
            .collect()
    }
}

/// The format of the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    /// Word document (Office Open XML).
    Docx,
    /// Legacy Word binary (OLE/CFB). Detected only to be rejected.
    Doc,
}

impl DocumentFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // DOCX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Docx);
        }

        // DOC is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.len() >= 8
            && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Doc);
        }

        None
    }
}

/// One unit of extracted content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    /// A non-empty paragraph of text.
    Paragraph { text: String },
    /// An embedded image written to disk, with the text found around it.
    Image {
        path: String,
        context: Option<String>,
    },
    /// A table as rows of cell text.
    Table { rows: Vec<Vec<String>> },
}

/// A topic returned by the LLM, anchored by a short marker excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub marker: String,
}

impl Topic {
    pub fn new(name: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            marker: marker.into(),
        }
    }
}

/// The span of source text attributed to one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub topic: String,
    pub content: String,
}

/// Structured content of one output slide, before layout.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlideRecord {
    /// Slide title.
    pub title: String,

    /// Bullet points in display order.
    pub bullets: Vec<String>,

    /// Path of the image placed on this slide, if any.
    pub image_path: Option<String>,

    /// Table rendered on this slide, if any.
    pub table: Option<Vec<Vec<String>>>,
}

impl SlideRecord {
    /// Create a slide with a title and no content.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Builder-style bullet list.
    pub fn with_bullets<I, S>(mut self, bullets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bullets = bullets.into_iter().map(Into::into).collect();
        self
    }

    /// Append a bullet point.
    pub fn add_bullet(&mut self, text: impl Into<String>) {
        self.bullets.push(text.into());
    }

    /// Whether this record carries too little content to become a slide.
    ///
    /// A slide without a real title and with at most one bullet is noise.
    pub fn is_noise(&self) -> bool {
        let title = self.title.trim();
        (title.is_empty() || title == UNTITLED) && self.bullets.len() <= 1
    }
}

/// An extracted image available for placement on a slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Path of the image file on disk.
    pub path: String,

    /// Surrounding text used for matching (caption, nearby paragraph).
    pub context: Option<String>,
}

impl ImageAsset {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The file name component of the path, or the whole path if it has none.
    pub fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.path)
    }
}
