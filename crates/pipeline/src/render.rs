//! Rendering a deck to one JPEG per slide.
//!
//! The deck is converted to PDF by a headless office suite and the PDF is
//! rasterized by `pdftoppm`. Both are external programs; this module only
//! drives them and collects their output.

use async_trait::async_trait;
use deck_core::{Error, ProcessingConfig, RenderedSlide, Result};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Time allowed for the office suite to convert the deck.
pub const PDF_CONVERSION_TIMEOUT: Duration = Duration::from_secs(120);

/// 72 dpi PDF points scaled by 1.5.
pub const RENDER_DPI: u32 = 108;

pub const DEFAULT_JPEG_QUALITY: u32 = 85;
pub const MIN_JPEG_QUALITY: u32 = 60;
const QUALITY_STEP: u32 = 10;

const IMAGE_PREFIX: &str = "slide";

/// Turns a deck into per-slide images, in slide order.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render every slide of `deck` into `workdir`.
    ///
    /// Failure means the whole deck could not be rendered.
    async fn render(&self, deck: &Path, workdir: &Path) -> Result<Vec<RenderedSlide>>;
}

/// Renderer backed by LibreOffice and poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct OfficeRenderer {
    libreoffice_command: String,
    pdftoppm_command: String,
    max_image_bytes: u64,
    conversion_timeout: Duration,
}

impl OfficeRenderer {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            libreoffice_command: config.libreoffice_command.clone(),
            pdftoppm_command: config.pdftoppm_command.clone(),
            max_image_bytes: (config.max_image_size_mb * 1024.0 * 1024.0) as u64,
            conversion_timeout: PDF_CONVERSION_TIMEOUT,
        }
    }

    /// Convert the deck to PDF inside `workdir`.
    async fn convert_to_pdf(&self, deck: &Path, workdir: &Path) -> Result<PathBuf> {
        let soffice = which::which(&self.libreoffice_command).map_err(|_| {
            Error::Render(format!(
                "LibreOffice command '{}' not found. Please install LibreOffice or configure LIBREOFFICE_COMMAND",
                self.libreoffice_command
            ))
        })?;

        let deck = deck.canonicalize()?;
        log::info!(
            "Converting {} to PDF...",
            deck.file_name().and_then(|n| n.to_str()).unwrap_or("deck")
        );

        let mut command = Command::new(soffice);
        command
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(workdir)
            .arg(&deck);
        run_tool(command, self.conversion_timeout, "LibreOffice conversion").await?;

        let stem = deck.file_stem().and_then(|s| s.to_str()).unwrap_or("deck");
        let pdf_path = workdir.join(format!("{}.pdf", stem));
        if !pdf_path.exists() {
            return Err(Error::Render(format!(
                "PDF conversion failed - output file not found: {}",
                pdf_path.display()
            )));
        }

        log::info!("Successfully converted to: {}", pdf_path.display());
        Ok(pdf_path)
    }

    /// Rasterize pages of `pdf` to JPEG.
    ///
    /// With `page` set, only that page is written, to `<prefix>.jpg`.
    async fn rasterize(
        &self,
        pdf: &Path,
        prefix: &Path,
        quality: u32,
        page: Option<usize>,
    ) -> Result<()> {
        let pdftoppm = which::which(&self.pdftoppm_command).map_err(|_| {
            Error::Render(format!(
                "pdftoppm command '{}' not found. Please install poppler-utils or configure PDFTOPPM_COMMAND",
                self.pdftoppm_command
            ))
        })?;

        let mut command = Command::new(pdftoppm);
        command
            .arg("-jpeg")
            .arg("-r")
            .arg(RENDER_DPI.to_string())
            .arg("-jpegopt")
            .arg(format!("quality={},optimize=y", quality));
        if let Some(page) = page {
            command
                .arg("-f")
                .arg(page.to_string())
                .arg("-l")
                .arg(page.to_string())
                .arg("-singlefile");
        }
        command.arg(pdf).arg(prefix);

        run_tool(command, self.conversion_timeout, "PDF rasterization").await?;
        Ok(())
    }

    /// Re-rasterize pages over the size limit at decreasing JPEG quality.
    async fn shrink_oversized(&self, pdf: &Path, workdir: &Path, slide: &RenderedSlide) -> Result<()> {
        let mut size = file_size(&slide.path).await?;
        let mut quality = DEFAULT_JPEG_QUALITY;

        while size > self.max_image_bytes && quality >= MIN_JPEG_QUALITY + QUALITY_STEP {
            quality -= QUALITY_STEP;
            let retry_prefix = workdir.join(format!("retry-{}", slide.slide_index));
            self.rasterize(pdf, &retry_prefix, quality, Some(slide.slide_index))
                .await?;
            tokio::fs::rename(retry_prefix.with_extension("jpg"), &slide.path).await?;
            size = file_size(&slide.path).await?;
        }

        log::info!(
            "Extracted slide {} as JPEG ({:.1}MB, quality={})",
            slide.slide_index,
            size as f64 / (1024.0 * 1024.0),
            quality
        );
        Ok(())
    }
}

#[async_trait]
impl Renderer for OfficeRenderer {
    async fn render(&self, deck: &Path, workdir: &Path) -> Result<Vec<RenderedSlide>> {
        if !deck.exists() {
            return Err(Error::Render(format!(
                "PowerPoint file not found: {}",
                deck.display()
            )));
        }

        let pdf = self.convert_to_pdf(deck, workdir).await?;
        self.rasterize(&pdf, &workdir.join(IMAGE_PREFIX), DEFAULT_JPEG_QUALITY, None)
            .await?;

        let slides = collect_pages(workdir)?;
        log::info!("PDF has {} pages", slides.len());

        for slide in &slides {
            self.shrink_oversized(&pdf, workdir, slide).await?;
        }

        Ok(slides)
    }
}

/// Run an external tool, failing on timeout or non-zero exit.
async fn run_tool(mut command: Command, limit: Duration, what: &str) -> Result<Output> {
    command.kill_on_drop(true);
    log::debug!("Running {:?}", command.as_std());

    let output = tokio::time::timeout(limit, command.output())
        .await
        .map_err(|_| Error::Render(format!("{} timed out", what)))?
        .map_err(|e| Error::Render(format!("{} could not start: {}", what, e)))?;

    if !output.status.success() {
        return Err(Error::Render(format!(
            "{} failed ({}): {}",
            what,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output)
}

async fn file_size(path: &Path) -> Result<u64> {
    Ok(tokio::fs::metadata(path).await?.len())
}

/// Find `slide-<n>.jpg` files written by pdftoppm, ordered by page number.
///
/// pdftoppm zero-pads page numbers to the width of the page count, so the
/// number is parsed rather than sorted as text.
fn collect_pages(workdir: &Path) -> Result<Vec<RenderedSlide>> {
    let mut slides = Vec::new();
    for entry in std::fs::read_dir(workdir)? {
        let path = entry?.path();
        if let Some(slide_index) = page_number(&path) {
            slides.push(RenderedSlide { slide_index, path });
        }
    }

    if slides.is_empty() {
        return Err(Error::Render(format!(
            "No slide images were produced in {}",
            workdir.display()
        )));
    }

    slides.sort_by_key(|s| s.slide_index);
    if let Some(pair) = slides
        .windows(2)
        .find(|pair| pair[0].slide_index == pair[1].slide_index)
    {
        return Err(Error::Render(format!(
            "Duplicate images for slide {}: {} and {}",
            pair[0].slide_index,
            pair[0].path.display(),
            pair[1].path.display()
        )));
    }
    Ok(slides)
}

fn page_number(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix(IMAGE_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}
