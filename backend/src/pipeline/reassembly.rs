use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::sanitizer::BLOCKQUOTE_TOKEN;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub paragraphs: Vec<String>,
}

/// The JSON envelope a rewrite returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewrittenArticle {
    pub title: String,
    pub sections: Vec<Section>,
    pub seo_title: String,
    pub meta_title: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub summary: String,
    pub primary_category: String,
    pub secondary_category: String,
}

impl RewrittenArticle {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn content_html(&self) -> String {
        sections_to_html(&self.sections)
    }
}

/// Replaces every `[BLOCKQUOTE]` in every string leaf of `value`, in document order.
///
/// Occurrence `i` receives `blockquotes[i % blockquotes.len()]`, so a response with more
/// placeholders than blockquotes reuses earlier ones. Returns the number of placeholders
/// replaced. An empty list leaves `value` untouched.
pub fn substitute_blockquotes(value: &mut Value, blockquotes: &[String]) -> usize {
    if blockquotes.is_empty() {
        return 0;
    }
    let mut next = 0;
    substitute_in(value, blockquotes, &mut next);
    if next > blockquotes.len() {
        warn!(
            placeholders = next,
            blockquotes = blockquotes.len(),
            "Model emitted more blockquote placeholders than the source had. Reusing earlier blockquotes."
        );
    }
    next
}

fn substitute_in(value: &mut Value, blockquotes: &[String], next: &mut usize) {
    match value {
        Value::String(text) if text.contains(BLOCKQUOTE_TOKEN) => {
            let mut rebuilt = String::with_capacity(text.len());
            let mut parts = text.split(BLOCKQUOTE_TOKEN);
            if let Some(first) = parts.next() {
                rebuilt.push_str(first);
            }
            for part in parts {
                rebuilt.push_str(&blockquotes[*next % blockquotes.len()]);
                *next += 1;
                rebuilt.push_str(part);
            }
            *text = rebuilt;
        }
        Value::Array(items) => {
            for item in items {
                substitute_in(item, blockquotes, next);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                substitute_in(item, blockquotes, next);
            }
        }
        _ => {}
    }
}

/// `<h2>heading</h2><p>paragraph</p>...` in section order. Empty headings are omitted.
pub fn sections_to_html(sections: &[Section]) -> String {
    let mut html = String::new();
    for section in sections {
        if !section.heading.trim().is_empty() {
            html.push_str("<h2>");
            html.push_str(&section.heading);
            html.push_str("</h2>");
        }
        for paragraph in &section.paragraphs {
            html.push_str("<p>");
            html.push_str(paragraph);
            html.push_str("</p>");
        }
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quotes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("<blockquote>q{i}</blockquote>")).collect()
    }

    #[test]
    fn test_occurrences_cycle_in_document_order() {
        let mut value = json!({
            "title": "No quotes here",
            "sections": [
                { "heading": "One", "paragraphs": ["a [BLOCKQUOTE] b", "[BLOCKQUOTE][BLOCKQUOTE]"] },
                { "heading": "Two [BLOCKQUOTE]", "paragraphs": ["[BLOCKQUOTE]"] }
            ],
            "summary": "[BLOCKQUOTE]"
        });
        let replaced = substitute_blockquotes(&mut value, &quotes(2));
        assert_eq!(replaced, 6);

        assert_eq!(value["sections"][0]["paragraphs"][0], "a <blockquote>q0</blockquote> b");
        assert_eq!(
            value["sections"][0]["paragraphs"][1],
            "<blockquote>q1</blockquote><blockquote>q0</blockquote>"
        );
        assert_eq!(value["sections"][1]["heading"], "Two <blockquote>q1</blockquote>");
        assert_eq!(value["sections"][1]["paragraphs"][0], "<blockquote>q0</blockquote>");
        assert_eq!(value["summary"], "<blockquote>q1</blockquote>");
    }

    #[test]
    fn test_empty_list_leaves_placeholders() {
        let mut value = json!({ "summary": "[BLOCKQUOTE]" });
        assert_eq!(substitute_blockquotes(&mut value, &[]), 0);
        assert_eq!(value["summary"], "[BLOCKQUOTE]");
    }

    #[test]
    fn test_sections_flatten_to_html_and_missing_fields_default() {
        let value = json!({
            "title": "Headline",
            "sections": [
                { "heading": "Intro", "paragraphs": ["First.", "Second."] },
                { "paragraphs": ["Untitled section."] }
            ],
            "meta_keywords": "a, b"
        });
        let article = RewrittenArticle::from_value(value).unwrap();
        assert_eq!(article.title, "Headline");
        assert_eq!(article.summary, "");
        assert_eq!(
            article.content_html(),
            "<h2>Intro</h2><p>First.</p><p>Second.</p><p>Untitled section.</p>"
        );
    }

    #[test]
    fn test_wrongly_typed_envelope_is_rejected() {
        let value = json!({ "title": "x", "sections": "not a list" });
        assert!(RewrittenArticle::from_value(value).is_err());
    }
}
