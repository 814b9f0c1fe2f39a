//! Error types for deck-to-ticket conversion.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning a deck into tickets.
///
/// `Config`, `Pptx*` and `Render` errors abort a run. `Analysis` and
/// `Ticket` errors are recorded against a single slide.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read a file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file is not a PPTX deck.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to parse the PPTX file structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// The deck could not be rendered to slide images.
    #[error("Rendering failed: {0}")]
    Render(String),

    /// The language model call failed or returned an unusable reply.
    #[error("Slide analysis failed: {0}")]
    Analysis(String),

    /// The issue tracker rejected or failed the ticket.
    #[error("Ticket creation failed: {0}")]
    Ticket(String),
}
