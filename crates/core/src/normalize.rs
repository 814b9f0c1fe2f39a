//! Text normalization for slide text.
//!
//! PowerPoint text arrives with a mix of line-ending styles, vertical tabs
//! for soft breaks, and runs of padding whitespace. Issue markers are matched
//! per line, so every shape is reduced to clean, trimmed, non-empty lines.

use crate::ExtractedSlide;
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Regex to collapse multiple horizontal whitespace characters into one.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").expect("static regex"));

/// Line-break-like characters PowerPoint emits inside a text frame.
const BREAK_CHARS: &[char] = &['\r', '\u{000B}', '\u{2028}', '\u{2029}'];

/// Text normalizer for slide text.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    /// Whether to keep lines that are empty after trimming.
    keep_empty_lines: bool,
}

impl TextNormalizer {
    /// Create a new text normalizer with default settings.
    pub fn new() -> Self {
        Self {
            keep_empty_lines: false,
        }
    }

    /// Set whether to keep empty lines.
    pub fn with_keep_empty_lines(mut self, keep: bool) -> Self {
        self.keep_empty_lines = keep;
        self
    }

    /// Normalize the text of a single shape.
    ///
    /// - Applies Unicode NFC normalization
    /// - Converts CR, CRLF, vertical tab and Unicode separators to `\n`
    /// - Collapses whitespace runs to single spaces
    /// - Trims each line and drops empty ones
    pub fn normalize_text(&self, text: &str) -> String {
        let composed: String = text.replace("\r\n", "\n").nfc().collect();
        let unified: String = composed
            .chars()
            .map(|c| if BREAK_CHARS.contains(&c) { '\n' } else { c })
            .collect();

        unified
            .split('\n')
            .map(|line| WHITESPACE_COLLAPSE_REGEX.replace_all(line, " ").trim().to_string())
            .filter(|line| self.keep_empty_lines || !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Normalize all shapes on a slide into one newline-separated text.
    ///
    /// This is the raw text that issue rules are matched against and that is
    /// sent alongside the slide image for analysis.
    pub fn normalize_slide(&self, slide: &ExtractedSlide) -> String {
        slide
            .lines
            .iter()
            .map(|shape| self.normalize_text(&shape.text))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SlideText;

    #[test]
    fn test_line_endings_unified() {
        let normalizer = TextNormalizer::new();

        assert_eq!(normalizer.normalize_text("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(normalizer.normalize_text("a\u{000B}b"), "a\nb");
        assert_eq!(normalizer.normalize_text("a\u{2028}b"), "a\nb");
    }

    #[test]
    fn test_collapse_whitespace() {
        let normalizer = TextNormalizer::new();

        assert_eq!(normalizer.normalize_text("Bug:   memory\tleak"), "Bug: memory leak");
        assert_eq!(normalizer.normalize_text("  Issue: x  "), "Issue: x");
        assert_eq!(normalizer.normalize_text("\u{00A0}Issue:\u{00A0}x"), "Issue: x");
    }

    #[test]
    fn test_empty_lines_dropped() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize_text("one\n\n   \ntwo"), "one\ntwo");
    }

    #[test]
    fn test_empty_lines_kept_when_requested() {
        let normalizer = TextNormalizer::new().with_keep_empty_lines(true);
        assert_eq!(normalizer.normalize_text("one\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn test_nfc_composition() {
        let normalizer = TextNormalizer::new();
        // "e" + combining acute accent composes to a single code point
        assert_eq!(normalizer.normalize_text("Caf\u{0065}\u{0301}"), "Caf\u{00E9}");
    }

    #[test]
    fn test_normalize_slide_joins_shapes() {
        let normalizer = TextNormalizer::new();

        let mut slide = ExtractedSlide::new(3);
        slide.lines.push(SlideText::new("Quarterly review"));
        slide.lines.push(SlideText::new("   "));
        slide.lines.push(SlideText::new("DB issue: low ANI\r\nseen in prod"));

        assert_eq!(
            normalizer.normalize_slide(&slide),
            "Quarterly review\nDB issue: low ANI\nseen in prod"
        );
    }
}
