//! Rendering, AI analysis and ticket creation for issue slides, plus the
//! pipeline that drives them over a deck.

pub mod classifier;
pub mod orchestrator;
pub mod render;
pub mod sink;
pub mod workdir;

#[cfg(test)]
mod test_support;

pub use classifier::{Classifier, OpenAiClassifier};
pub use orchestrator::{Pipeline, PipelineOptions};
pub use render::{OfficeRenderer, Renderer};
pub use sink::{build_sink, JiraSink, RecordingSink, TicketRequest, TicketSink};
pub use workdir::WorkDir;
