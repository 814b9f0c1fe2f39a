//! Core domain types, slide scanning, project resolution and reporting
//! for turning issue slides into tracker tickets.

pub mod adf;
pub mod analysis;
pub mod config;
pub mod error;
pub mod normalize;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod types;

pub use analysis::{IssueType, Priority, SlideAnalysis};
pub use config::{JiraCredentials, ProcessingConfig};
pub use error::{Error, Result};
pub use normalize::TextNormalizer;
pub use report::{ReportFormatter, RunReport, SlideReport, TicketOutcome, TicketResult};
pub use resolver::{DecisionSource, ProjectDecision, ProjectResolver};
pub use scanner::{RuleConfig, RuleSet, SlideMatch, SlideScanner};
pub use types::{ExtractedSlide, Presentation, PresentationFormat, RenderedSlide, SlideText};
