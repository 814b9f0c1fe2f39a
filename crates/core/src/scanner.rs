//! Slide text scanning.
//!
//! Decides which slides describe an issue and, where a project-specific rule
//! matches, which project the slide belongs to. Matching is case-insensitive
//! and line-anchored: `^` matches at the start of the text or after any
//! newline, so a marker on the third line of a text box still counts.

use crate::{Error, ExtractedSlide, Presentation, Result, TextNormalizer};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Project used when a slide qualifies but no project rule matched.
pub const DEFAULT_PROJECT: &str = "AP";

/// Generic markers that qualify a slide without choosing a project.
pub const DEFAULT_DETECTION_PATTERNS: &[&str] = &[r"^issue:", r"^bug:"];

/// A project rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Stable identifier reported as `matched_rule_id`.
    pub id: String,
    /// Regular expression matched against slide text.
    pub pattern: String,
    /// Project key assigned to slides matching this rule.
    pub project: String,
}

/// Rule configuration, loadable from a JSON rules file.
///
/// Order matters: `rules` are tried first to last and the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default = "default_project")]
    pub default_project: String,

    #[serde(default = "default_detection_patterns")]
    pub detection_patterns: Vec<String>,

    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

fn default_detection_patterns() -> Vec<String> {
    DEFAULT_DETECTION_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            default_project: default_project(),
            detection_patterns: default_detection_patterns(),
            rules: vec![RuleSpec {
                id: "db-rule".to_string(),
                pattern: r"^db issue:".to_string(),
                project: "PGDB".to_string(),
            }],
        }
    }
}

impl RuleConfig {
    /// Parse a rules file body.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid rules file: {}", e)))
    }

    /// Load a rules file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read rules file {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }
}

/// A compiled project rule.
#[derive(Debug, Clone)]
pub struct ProjectRule {
    pub id: String,
    pub pattern: Regex,
    pub project: String,
}

/// Compiled, ordered rule table.
#[derive(Debug, Clone)]
pub struct RuleSet {
    detection: Vec<Regex>,
    rules: Vec<ProjectRule>,
    default_project: String,
}

impl RuleSet {
    /// Compile a rule configuration, rejecting bad patterns and ambiguous ids.
    pub fn compile(config: &RuleConfig) -> Result<Self> {
        let default_project = config.default_project.trim();
        if default_project.is_empty() {
            return Err(Error::Config("Default project key must not be empty".into()));
        }

        let detection = config
            .detection_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(config.rules.len());
        for spec in &config.rules {
            if !seen.insert(spec.id.as_str()) {
                return Err(Error::Config(format!("Duplicate rule id '{}'", spec.id)));
            }
            if spec.project.trim().is_empty() {
                return Err(Error::Config(format!("Rule '{}' has no project", spec.id)));
            }
            rules.push(ProjectRule {
                id: spec.id.clone(),
                pattern: compile_pattern(&spec.pattern)?,
                project: spec.project.trim().to_string(),
            });
        }

        Ok(Self {
            detection,
            rules,
            default_project: default_project.to_string(),
        })
    }

    /// Project used when no rule matches.
    pub fn default_project(&self) -> &str {
        &self.default_project
    }

    /// Number of project rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// The first project rule matching `text`, in configuration order.
    pub fn first_rule(&self, text: &str) -> Option<&ProjectRule> {
        self.rules.iter().find(|rule| rule.pattern.is_match(text))
    }

    /// Whether `text` carries a generic issue marker.
    pub fn has_marker(&self, text: &str) -> bool {
        self.detection.iter().any(|re| re.is_match(text))
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::compile(&RuleConfig::default()).expect("built-in rules compile")
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|e| Error::Config(format!("Invalid pattern '{}': {}", pattern, e)))
}

/// Scan result for one slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlideMatch {
    /// 1-based slide number.
    pub slide_index: usize,
    /// Normalized slide text the rules were matched against.
    pub raw_text: String,
    /// Whether the slide describes an issue.
    pub qualifies: bool,
    /// Id of the first project rule that matched, if any.
    pub matched_rule_id: Option<String>,
    /// Project of the matched rule. Never the default project.
    pub resolved_project: Option<String>,
}

/// Scans slide text against an ordered rule table.
#[derive(Debug, Clone, Default)]
pub struct SlideScanner {
    rules: RuleSet,
    normalizer: TextNormalizer,
}

impl SlideScanner {
    /// Create a scanner over the given rules.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            normalizer: TextNormalizer::new(),
        }
    }

    /// The rule table in use.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Scan every slide of a presentation, qualifying or not, in slide order.
    pub fn scan(&self, presentation: &Presentation) -> Vec<SlideMatch> {
        presentation
            .slides
            .iter()
            .map(|slide| self.scan_slide(slide))
            .collect()
    }

    /// Scan a single extracted slide.
    pub fn scan_slide(&self, slide: &ExtractedSlide) -> SlideMatch {
        let text = self.normalizer.normalize_slide(slide);
        self.scan_text(slide.number, text)
    }

    /// Scan already-normalized slide text.
    pub fn scan_text(&self, slide_index: usize, text: impl Into<String>) -> SlideMatch {
        let raw_text = text.into();
        let rule = self.rules.first_rule(&raw_text);
        let qualifies = rule.is_some() || self.rules.has_marker(&raw_text);

        if qualifies {
            log::info!(
                "Found issue slide {} (rule: {})",
                slide_index,
                rule.map(|r| r.id.as_str()).unwrap_or("none")
            );
        }

        SlideMatch {
            slide_index,
            qualifies,
            matched_rule_id: rule.map(|r| r.id.clone()),
            resolved_project: rule.map(|r| r.project.clone()),
            raw_text,
        }
    }
}

/// Keep only qualifying slides, preserving slide order.
pub fn qualifying(matches: Vec<SlideMatch>) -> Vec<SlideMatch> {
    matches.into_iter().filter(|m| m.qualifies).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SlideText;

    fn rules(specs: &[(&str, &str, &str)]) -> RuleSet {
        RuleSet::compile(&RuleConfig {
            default_project: "AP".into(),
            detection_patterns: default_detection_patterns(),
            rules: specs
                .iter()
                .map(|(id, pattern, project)| RuleSpec {
                    id: id.to_string(),
                    pattern: pattern.to_string(),
                    project: project.to_string(),
                })
                .collect(),
        })
        .unwrap()
    }

    #[test]
    fn test_db_rule_assigns_project() {
        let scanner = SlideScanner::default();
        let m = scanner.scan_text(4, "DB issue: low ANI");

        assert!(m.qualifies);
        assert_eq!(m.matched_rule_id.as_deref(), Some("db-rule"));
        assert_eq!(m.resolved_project.as_deref(), Some("PGDB"));
    }

    #[test]
    fn test_generic_marker_qualifies_without_project() {
        let scanner = SlideScanner::default();
        let m = scanner.scan_text(2, "Bug: memory leak");

        assert!(m.qualifies);
        assert_eq!(m.matched_rule_id, None);
        assert_eq!(m.resolved_project, None);
    }

    #[test]
    fn test_case_insensitive() {
        let scanner = SlideScanner::default();
        assert!(scanner.scan_text(1, "ISSUE: upper").qualifies);
        assert_eq!(
            scanner.scan_text(1, "db ISSUE: mixed").matched_rule_id.as_deref(),
            Some("db-rule")
        );
    }

    #[test]
    fn test_marker_after_newline_matches() {
        let scanner = SlideScanner::default();
        let m = scanner.scan_text(1, "Agenda\nNotes\nbug: crash on save");
        assert!(m.qualifies);
    }

    #[test]
    fn test_marker_mid_line_does_not_match() {
        let scanner = SlideScanner::default();
        let m = scanner.scan_text(1, "There is no issue: really");
        assert!(!m.qualifies);
        assert_eq!(m.resolved_project, None);
    }

    #[test]
    fn test_unmatched_slide_not_assigned_default() {
        let scanner = SlideScanner::default();
        let m = scanner.scan_text(9, "Roadmap for Q3");

        assert!(!m.qualifies);
        assert_eq!(m.matched_rule_id, None);
        assert_eq!(m.resolved_project, None);
    }

    #[test]
    fn test_first_rule_in_order_wins() {
        let scanner = SlideScanner::new(rules(&[
            ("net-rule", r"^net", "NET"),
            ("netdb-rule", r"^net db issue:", "NETDB"),
        ]));
        let m = scanner.scan_text(1, "Net DB issue: replication lag");
        assert_eq!(m.matched_rule_id.as_deref(), Some("net-rule"));
        assert_eq!(m.resolved_project.as_deref(), Some("NET"));

        let reversed = SlideScanner::new(rules(&[
            ("netdb-rule", r"^net db issue:", "NETDB"),
            ("net-rule", r"^net", "NET"),
        ]));
        let m = reversed.scan_text(1, "Net DB issue: replication lag");
        assert_eq!(m.matched_rule_id.as_deref(), Some("netdb-rule"));
    }

    #[test]
    fn test_rule_order_across_lines() {
        let scanner = SlideScanner::new(rules(&[
            ("ui-rule", r"^ui issue:", "UI"),
            ("db-rule", r"^db issue:", "PGDB"),
        ]));
        // The db marker comes first in the text, but ui-rule comes first in the table.
        let m = scanner.scan_text(1, "DB issue: slow\nUI issue: flicker");
        assert_eq!(m.matched_rule_id.as_deref(), Some("ui-rule"));
    }

    #[test]
    fn test_scan_keeps_every_slide_in_order() {
        let mut presentation = Presentation::new("deck.pptx");
        for (number, text) in [(1, "Title slide"), (2, "Issue: one"), (3, "DB issue: two")] {
            let mut slide = ExtractedSlide::new(number);
            slide.lines.push(SlideText::new(text));
            presentation.add_slide(slide);
        }

        let scanner = SlideScanner::default();
        let matches = scanner.scan(&presentation);
        assert_eq!(matches.len(), 3);
        assert_eq!(
            matches.iter().map(|m| m.slide_index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let kept = qualifying(matches);
        assert_eq!(
            kept.iter().map(|m| m.slide_index).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn test_compile_rejects_invalid_pattern() {
        let config = RuleConfig {
            rules: vec![RuleSpec {
                id: "bad".into(),
                pattern: "(unclosed".into(),
                project: "X".into(),
            }],
            ..RuleConfig::default()
        };
        assert!(matches!(RuleSet::compile(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_compile_rejects_duplicate_ids() {
        let spec = RuleSpec {
            id: "dup".into(),
            pattern: "^x".into(),
            project: "X".into(),
        };
        let config = RuleConfig {
            rules: vec![spec.clone(), spec],
            ..RuleConfig::default()
        };
        assert!(matches!(RuleSet::compile(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_compile_rejects_empty_default() {
        let config = RuleConfig {
            default_project: "  ".into(),
            ..RuleConfig::default()
        };
        assert!(RuleSet::compile(&config).is_err());
    }

    #[test]
    fn test_rules_file_defaults() {
        let config = RuleConfig::from_json(
            r#"{"rules": [{"id": "ops", "pattern": "^ops:", "project": "OPS"}]}"#,
        )
        .unwrap();

        assert_eq!(config.default_project, "AP");
        assert_eq!(config.detection_patterns, vec!["^issue:", "^bug:"]);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].project, "OPS");
    }

    #[test]
    fn test_rules_file_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"{"default_project": "CORE", "detection_patterns": ["^todo:"], "rules": []}"#,
        )
        .unwrap();

        let set = RuleSet::compile(&RuleConfig::load(&path).unwrap()).unwrap();
        assert_eq!(set.default_project(), "CORE");
        assert!(set.has_marker("TODO: fix"));
        assert!(!set.has_marker("Issue: not a marker here"));
    }

    #[test]
    fn test_rules_file_invalid_json() {
        assert!(matches!(
            RuleConfig::from_json("{not json"),
            Err(Error::Config(_))
        ));
    }
}
