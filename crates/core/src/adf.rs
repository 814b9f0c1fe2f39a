//! Conversion of markdown-ish descriptions to Atlassian Document Format.

use serde_json::{json, Value};

/// Convert a description to an ADF document.
///
/// Paragraphs are separated by blank lines. `# ` and `## ` paragraphs become
/// headings and a paragraph wrapped entirely in `**` becomes bold text.
pub fn to_adf(text: &str) -> Value {
    let content: Vec<Value> = text
        .replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|para| !para.is_empty())
        .map(block)
        .collect();

    json!({
        "type": "doc",
        "version": 1,
        "content": content,
    })
}

fn block(para: &str) -> Value {
    if let Some(heading) = para.strip_prefix("## ") {
        return json!({
            "type": "heading",
            "attrs": { "level": 2 },
            "content": [text_node(heading)],
        });
    }
    if let Some(heading) = para.strip_prefix("# ") {
        return json!({
            "type": "heading",
            "attrs": { "level": 1 },
            "content": [text_node(heading)],
        });
    }
    if para.len() > 4 && para.starts_with("**") && para.ends_with("**") {
        return json!({
            "type": "paragraph",
            "content": [{
                "type": "text",
                "text": &para[2..para.len() - 2],
                "marks": [{ "type": "strong" }],
            }],
        });
    }
    json!({
        "type": "paragraph",
        "content": [text_node(para)],
    })
}

fn text_node(text: &str) -> Value {
    json!({ "type": "text", "text": text })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_description() {
        assert_eq!(
            to_adf("   "),
            json!({ "type": "doc", "version": 1, "content": [] })
        );
    }

    #[test]
    fn test_paragraphs_and_headings() {
        let doc = to_adf("# Problem\n\nANI is low.\n\n## Next steps\n\n**Escalate to DBA**");
        let content = doc["content"].as_array().unwrap();

        assert_eq!(content.len(), 4);
        assert_eq!(content[0]["type"], "heading");
        assert_eq!(content[0]["attrs"]["level"], 1);
        assert_eq!(content[0]["content"][0]["text"], "Problem");
        assert_eq!(content[1]["type"], "paragraph");
        assert_eq!(content[1]["content"][0]["text"], "ANI is low.");
        assert_eq!(content[2]["attrs"]["level"], 2);
        assert_eq!(content[2]["content"][0]["text"], "Next steps");
        assert_eq!(content[3]["content"][0]["text"], "Escalate to DBA");
        assert_eq!(content[3]["content"][0]["marks"][0]["type"], "strong");
    }

    #[test]
    fn test_single_newlines_stay_in_paragraph() {
        let doc = to_adf("line one\nline two");
        assert_eq!(doc["content"][0]["content"][0]["text"], "line one\nline two");
    }

    #[test]
    fn test_bare_asterisks_are_plain() {
        let doc = to_adf("****");
        assert_eq!(doc["content"][0]["content"][0]["text"], "****");
        assert!(doc["content"][0]["content"][0].get("marks").is_none());
    }
}
