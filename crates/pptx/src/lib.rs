//! PPTX (OOXML) reader for issue scanning.
//!
//! Parses .pptx files, which are ZIP archives containing XML documents, into
//! per-slide text in presentation order.

pub mod parser;

pub use parser::PptxParser;

use deck_core::{Error, Presentation, PresentationFormat, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Open a deck from disk, checking its format before parsing.
pub fn read_deck(path: &Path) -> Result<Presentation> {
    let mut file = File::open(path)?;

    let mut magic = [0u8; 8];
    let read = file.read(&mut magic)?;

    let format = PresentationFormat::from_magic(&magic[..read])
        .or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(PresentationFormat::from_extension)
        })
        .ok_or_else(|| {
            Error::UnsupportedFormat(format!("{} is not a PowerPoint file", path.display()))
        })?;

    if format == PresentationFormat::Ppt {
        return Err(Error::UnsupportedFormat(format!(
            "{} is a legacy .ppt deck; save it as .pptx first",
            path.display()
        )));
    }

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    // Re-open so the archive reader starts at the beginning
    let reader = BufReader::new(File::open(path)?);
    log::debug!("Parsing {} as PPTX", path.display());
    PptxParser::new().parse(reader, filename)
}
