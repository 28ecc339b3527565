//! Error types for document-to-deck conversion.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a deck.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open, read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The input format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the DOCX file structure.
    #[error("DOCX parsing error: {0}")]
    DocxParseError(String),

    /// The presentation template is missing required parts.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// ZIP archive error (DOCX input or PPTX template/output).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// An image could not be read or measured.
    #[error("Image error: {0}")]
    ImageError(String),

    /// A required credential is not configured.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The LLM request failed (transport, HTTP status or response decoding).
    #[error("LLM call failed: {0}")]
    Llm(String),

    /// The LLM answered, but not in a usable shape.
    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),
}

impl Error {
    /// Whether the pipeline may skip the failing unit of work and continue.
    ///
    /// Only a missing credential aborts a run; everything else degrades the
    /// deck instead of stopping it.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::MissingCredential(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedResponse(err.to_string())
    }
}
