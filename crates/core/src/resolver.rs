//! Project resolution for qualifying slides.

use crate::SlideMatch;
use serde::Serialize;

/// Where a project decision came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DecisionSource {
    /// The operator's manual project key.
    Override,
    /// A project rule, by id.
    Rule(String),
    /// No rule matched.
    Default,
}

/// The project a slide's ticket will be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDecision {
    pub slide_index: usize,
    pub project_key: String,
    pub source: DecisionSource,
}

/// Resolves each slide to exactly one project.
///
/// The two modes are exclusive: with an override every slide gets the
/// override and rule matches are ignored; without one the scan result
/// decides. Only scanned slide text feeds the decision.
#[derive(Debug, Clone)]
pub struct ProjectResolver {
    manual_override: Option<String>,
    default_project: String,
}

impl ProjectResolver {
    /// Create a resolver. Blank overrides are treated as absent.
    pub fn new(manual_override: Option<String>, default_project: impl Into<String>) -> Self {
        Self {
            manual_override: manual_override
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            default_project: default_project.into(),
        }
    }

    /// The manual override in effect, if any.
    pub fn manual_override(&self) -> Option<&str> {
        self.manual_override.as_deref()
    }

    /// Decide the project for one scanned slide.
    pub fn resolve(&self, slide: &SlideMatch) -> ProjectDecision {
        let (project_key, source) = match (&self.manual_override, &slide.resolved_project) {
            (Some(key), _) => (key.clone(), DecisionSource::Override),
            (None, Some(project)) => (
                project.clone(),
                DecisionSource::Rule(slide.matched_rule_id.clone().unwrap_or_default()),
            ),
            (None, None) => (self.default_project.clone(), DecisionSource::Default),
        };

        log::debug!("Slide {} -> project {}", slide.slide_index, project_key);

        ProjectDecision {
            slide_index: slide.slide_index,
            project_key,
            source,
        }
    }
}
