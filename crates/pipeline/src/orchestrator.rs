//! End-to-end pipeline: scan, render, analyze, resolve, file tickets.
//!
//! Per-slide work runs as independent futures driven together on the current
//! task. AI calls pass through a counting semaphore so no more than
//! `max_concurrent_requests` are ever in flight; ticket creation happens
//! after the permit is released. Results come back in qualifying-slide order
//! whatever order the calls complete in.

use crate::classifier::{Classifier, OpenAiClassifier};
use crate::render::{OfficeRenderer, Renderer};
use crate::sink::{build_sink, TicketRequest, TicketSink};
use crate::workdir::WorkDir;
use deck_core::scanner::qualifying;
use deck_core::{
    Error, Presentation, ProcessingConfig, ProjectDecision, ProjectResolver, RenderedSlide,
    Result, RunReport, SlideMatch, SlideReport, SlideScanner, TicketResult,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Knobs that shape a run but not its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_concurrent_requests: usize,
    /// Stagger between AI dispatches.
    pub request_delay: Duration,
    /// Keep the work directory after the run.
    pub keep_workdir: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            max_concurrent_requests: config.max_concurrent_requests,
            request_delay: config.request_delay,
            keep_workdir: config.debug,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrent_requests: deck_core::config::DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_delay: Duration::ZERO,
            keep_workdir: false,
        }
    }
}

pub struct Pipeline {
    scanner: SlideScanner,
    resolver: ProjectResolver,
    renderer: Arc<dyn Renderer>,
    classifier: Arc<dyn Classifier>,
    sink: Arc<dyn TicketSink>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        scanner: SlideScanner,
        resolver: ProjectResolver,
        renderer: Arc<dyn Renderer>,
        classifier: Arc<dyn Classifier>,
        sink: Arc<dyn TicketSink>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            scanner,
            resolver,
            renderer,
            classifier,
            sink,
            options,
        }
    }

    /// Wire up the real collaborators from configuration.
    pub fn from_config(config: &ProcessingConfig) -> Result<Self> {
        config.validate()?;

        let rules = config.load_rules()?;
        let resolver = ProjectResolver::new(config.project_key.clone(), rules.default_project());
        match resolver.manual_override() {
            Some(key) => log::info!(
                "Using manual project key {}; rule-based project determination disabled",
                key
            ),
            None => log::info!("No manual project key specified - using rule-based project determination"),
        }

        Ok(Self::new(
            SlideScanner::new(rules),
            resolver,
            Arc::new(OfficeRenderer::new(config)),
            Arc::new(OpenAiClassifier::new(config)?),
            build_sink(config)?,
            PipelineOptions::from_config(config),
        ))
    }

    /// Read the deck from disk and process it.
    pub async fn run(&self, deck: &Path) -> Result<RunReport> {
        if !deck.exists() {
            return Err(Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", deck.display()),
            )));
        }
        let presentation = deck_pptx::read_deck(deck)?;
        self.process(deck, &presentation).await
    }

    /// Process an already-extracted deck.
    ///
    /// Errors returned here abort the whole run; per-slide failures are
    /// recorded in the report instead.
    pub async fn process(&self, deck: &Path, presentation: &Presentation) -> Result<RunReport> {
        let mut report = RunReport::new(deck, self.sink.is_dry_run());

        let issue_slides = qualifying(self.scanner.scan(presentation));
        if issue_slides.is_empty() {
            log::info!("No issue slides found");
            return Ok(report);
        }
        log::info!(
            "Found {} issue slides: {:?}",
            issue_slides.len(),
            issue_slides.iter().map(|s| s.slide_index).collect::<Vec<_>>()
        );

        let workdir = WorkDir::create(deck, self.options.keep_workdir)?;
        let rendered = self.renderer.render(deck, workdir.path()).await?;
        if rendered.len() != presentation.slide_count() {
            log::warn!(
                "Rendered {} pages for {} slides",
                rendered.len(),
                presentation.slide_count()
            );
        }
        let images: HashMap<usize, &RenderedSlide> =
            rendered.iter().map(|r| (r.slide_index, r)).collect();

        let decisions: Vec<ProjectDecision> = issue_slides
            .iter()
            .map(|slide| self.resolver.resolve(slide))
            .collect();

        let permits = self
            .options
            .max_concurrent_requests
            .clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Semaphore::new(permits);
        log::info!(
            "Starting analysis of {} slides (max {} concurrent)",
            issue_slides.len(),
            self.options.max_concurrent_requests
        );
        let started = Instant::now();

        let work = issue_slides
            .iter()
            .zip(decisions)
            .enumerate()
            .map(|(position, (slide, decision))| {
                let image = images.get(&slide.slide_index).copied();
                self.process_slide(position, slide, decision, image, &semaphore)
            });
        report.slides = join_all(work).await;

        log::info!(
            "Processed {} slides in {:.2} seconds ({} succeeded, {} failed)",
            report.slides.len(),
            started.elapsed().as_secs_f64(),
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    async fn process_slide(
        &self,
        position: usize,
        slide: &SlideMatch,
        decision: ProjectDecision,
        image: Option<&RenderedSlide>,
        semaphore: &Semaphore,
    ) -> SlideReport {
        let index = slide.slide_index;
        let failed = |decision: ProjectDecision, reason: String| {
            log::error!("Slide {}: {}", index, reason);
            SlideReport {
                slide_index: index,
                decision,
                analysis: None,
                result: TicketResult::failed(index, reason),
            }
        };

        let Some(image) = image else {
            return failed(decision, format!("Slide {} was not rendered", index));
        };

        if !self.options.request_delay.is_zero() && position > 0 {
            let slots = u32::try_from(position).unwrap_or(u32::MAX);
            tokio::time::sleep(self.options.request_delay.saturating_mul(slots)).await;
        }

        let analysis = match semaphore.acquire().await {
            Ok(_permit) => self.classifier.analyze(image, &slide.raw_text).await,
            Err(e) => Err(Error::Analysis(e.to_string())),
        };
        let analysis = match analysis {
            Ok(analysis) => analysis,
            Err(e) => return failed(decision, e.to_string()),
        };

        let request = TicketRequest {
            project_key: decision.project_key.clone(),
            analysis,
            attachment: Some(image.path.clone()),
        };
        let result = match self.sink.create_ticket(&request).await {
            Ok(ticket_id) => TicketResult::created(index, ticket_id),
            Err(e) => {
                log::error!("Failed to create issue for slide {}: {}", index, e);
                TicketResult::failed(index, e.to_string())
            }
        };

        SlideReport {
            slide_index: index,
            decision,
            analysis: Some(request.analysis),
            result,
        }
    }
}
