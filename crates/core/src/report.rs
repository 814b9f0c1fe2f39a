//! Per-slide results and the end-of-run report.

use crate::{ProjectDecision, SlideAnalysis};
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of the ticket step for one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TicketOutcome {
    /// Ticket id (or dry-run placeholder).
    Created(String),
    /// Human-readable failure reason.
    Failed(String),
}

/// Result for one qualifying slide. Exactly one of id or error is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketResult {
    pub slide_index: usize,
    pub outcome: TicketOutcome,
}

impl TicketResult {
    pub fn created(slide_index: usize, ticket_id: impl Into<String>) -> Self {
        Self {
            slide_index,
            outcome: TicketOutcome::Created(ticket_id.into()),
        }
    }

    pub fn failed(slide_index: usize, reason: impl Into<String>) -> Self {
        Self {
            slide_index,
            outcome: TicketOutcome::Failed(reason.into()),
        }
    }

    pub fn ticket_id(&self) -> Option<&str> {
        match &self.outcome {
            TicketOutcome::Created(id) => Some(id),
            TicketOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TicketOutcome::Created(_) => None,
            TicketOutcome::Failed(reason) => Some(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TicketOutcome::Created(_))
    }
}

/// Everything known about one qualifying slide at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SlideReport {
    pub slide_index: usize,
    pub decision: ProjectDecision,
    /// Present when the analysis step succeeded.
    pub analysis: Option<SlideAnalysis>,
    pub result: TicketResult,
}

/// Aggregated outcome of a run, ordered by slide index.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub deck: PathBuf,
    pub dry_run: bool,
    pub slides: Vec<SlideReport>,
}

impl RunReport {
    pub fn new(deck: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            deck: deck.into(),
            dry_run,
            slides: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.slides.iter().filter(|s| s.result.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.slides.len() - self.succeeded()
    }

    /// A run fails when something went wrong and nothing was created.
    pub fn is_failure(&self) -> bool {
        self.failed() > 0 && self.succeeded() == 0
    }
}

/// Plain-text formatter for run reports.
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    /// Print analysis details under each slide line.
    verbose: bool,
}

impl ReportFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show priority, type, labels and description for each slide.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Render one line per slide plus the summary line.
    ///
    /// # Example output
    /// ```text
    /// Slide 2 [AP] -> AP-101: Memory leak in worker
    /// Slide 4 [PGDB] -> FAILED: Slide analysis failed: timeout
    /// Created 1 of 2 tickets (1 failed)
    /// ```
    pub fn format(&self, report: &RunReport) -> String {
        let mut out = String::new();

        if report.slides.is_empty() {
            out.push_str("No issue slides found\n");
        }

        for slide in &report.slides {
            out.push_str(&self.format_line(slide));
            out.push('\n');
            if self.verbose || report.dry_run {
                if let Some(analysis) = &slide.analysis {
                    out.push_str(&format_details(analysis));
                }
            }
        }

        let verb = if report.dry_run { "Would create" } else { "Created" };
        out.push_str(&format!(
            "{} {} of {} tickets ({} failed)\n",
            verb,
            report.succeeded(),
            report.slides.len(),
            report.failed()
        ));
        out
    }

    fn format_line(&self, slide: &SlideReport) -> String {
        match &slide.result.outcome {
            TicketOutcome::Created(id) => format!(
                "Slide {} [{}] -> {}: {}",
                slide.slide_index,
                slide.decision.project_key,
                id,
                slide
                    .analysis
                    .as_ref()
                    .map(|a| a.title.as_str())
                    .unwrap_or_default()
            ),
            TicketOutcome::Failed(reason) => format!(
                "Slide {} [{}] -> FAILED: {}",
                slide.slide_index, slide.decision.project_key, reason
            ),
        }
    }
}

fn format_details(analysis: &SlideAnalysis) -> String {
    let labels: Vec<&str> = analysis.labels.iter().map(String::as_str).collect();
    let description: String = analysis
        .description
        .lines()
        .map(|line| format!("    {}\n", line))
        .collect();
    format!(
        "  Priority: {}\n  Type: {}\n  Labels: {}\n  Description:\n{}",
        analysis.priority,
        analysis.issue_type,
        labels.join(", "),
        description
    )
}
