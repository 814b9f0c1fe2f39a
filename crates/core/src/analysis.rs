//! Structured slide analysis and parsing of language model replies.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Maximum number of labels taken from a model reply.
pub const MAX_MODEL_LABELS: usize = 2;

/// Instructions sent with every slide.
pub const SYSTEM_PROMPT: &str = r#"You are an expert at analyzing presentation slides and extracting issue information for Jira management.

Given a slide image and the text found on the slide, extract the following information for creating a Jira issue:

1. **Title/Summary**: A concise title (max 200 chars) that captures the main issue
2. **Description**: A comprehensive description of the issue, including:
   - What the problem is
   - Any visible data, metrics, or evidence related to the issue
   - Context or background information related to the issue
   - Any proposed solutions or next steps mentioned

3. **Priority**: Estimate priority based on visual cues (High/Medium/Low), if not clear, use **Medium**.
4. **Issue Type**: Categorize as Bug or Task based on content, if not clear, use Task as default.
5. **Labels**: Add up to two most relevant labels to the issue.

Format your response as JSON:
```json
{
  "title": "Concise issue title",
  "description": "Detailed description in markdown format",
  "priority": "High|Medium|Low",
  "issue_type": "Bug|Task",
  "labels": ["label1", "label2"]
}
```

Be thorough but concise."#;

/// Build the per-slide user message.
pub fn user_prompt(slide_index: usize, raw_text: &str) -> String {
    format!(
        "Please analyze this slide (slide #{}) and extract issue information according to the format specified.\n\nText found on the slide:\n{}",
        slide_index, raw_text
    )
}

/// Ticket priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Parse a priority name, falling back to `Medium` for anything unknown.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" | "highest" | "critical" => Self::High,
            "low" | "lowest" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        };
        f.write_str(name)
    }
}

/// Ticket type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueType {
    Bug,
    #[default]
    Task,
}

impl IssueType {
    /// Parse an issue type name, falling back to `Task` for anything unknown.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "bug" | "defect" => Self::Bug,
            _ => Self::Task,
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bug => "Bug",
            Self::Task => "Task",
        };
        f.write_str(name)
    }
}

/// Structured analysis of one qualifying slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideAnalysis {
    pub slide_index: usize,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub issue_type: IssueType,
    pub labels: BTreeSet<String>,
}

impl SlideAnalysis {
    /// Title used when the model supplies none.
    pub fn default_title(slide_index: usize) -> String {
        format!("Issue from Slide {}", slide_index)
    }
}

/// Wire shape of the model's JSON. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    issue_type: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
}

/// Parse a model reply into a `SlideAnalysis`.
///
/// The JSON object is taken from the first `{` to the last `}`, so prose or
/// code fences around it are tolerated. A reply without a parseable object is
/// an `Error::Analysis`.
pub fn parse_reply(content: &str, slide_index: usize) -> Result<SlideAnalysis> {
    let (start, end) = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(Error::Analysis(format!(
                "No JSON object in model reply for slide {}",
                slide_index
            )))
        }
    };

    let raw: RawAnalysis = serde_json::from_str(&content[start..=end]).map_err(|e| {
        Error::Analysis(format!(
            "Malformed JSON in model reply for slide {}: {}",
            slide_index, e
        ))
    })?;

    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| SlideAnalysis::default_title(slide_index));

    let labels = raw
        .labels
        .iter()
        .map(|l| sanitize_label(l))
        .filter(|l| !l.is_empty())
        .take(MAX_MODEL_LABELS)
        .collect();

    Ok(SlideAnalysis {
        slide_index,
        title,
        description: raw.description.unwrap_or_default().trim().to_string(),
        priority: raw
            .priority
            .as_deref()
            .map(Priority::parse_lenient)
            .unwrap_or_default(),
        issue_type: raw
            .issue_type
            .as_deref()
            .map(IssueType::parse_lenient)
            .unwrap_or_default(),
        labels,
    })
}

/// Jira labels cannot contain whitespace.
fn sanitize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join("-")
}
