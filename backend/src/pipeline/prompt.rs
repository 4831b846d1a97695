use super::sanitizer::{BLOCKQUOTE_TOKEN, IFRAME_TOKEN, IMAGE_TOKEN, SanitizedContent};

/// Everything the system prompt depends on for one variant.
pub struct PromptInput<'a> {
    pub language: &'a str,
    pub categories: &'a [String],
    pub instruction: &'a str,
    pub content: &'a SanitizedContent,
}

fn numbered_tags<F>(sources: &[String], render: F) -> String
where
    F: Fn(&str) -> String,
{
    if sources.is_empty() {
        return "   (none)".to_string();
    }
    sources
        .iter()
        .enumerate()
        .map(|(i, src)| format!("   {}. {}", i + 1, render(src)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the system message for a rewrite request.
pub fn build_system_prompt(input: &PromptInput<'_>) -> String {
    let content = input.content;
    let image_count = content.text.matches(IMAGE_TOKEN).count();
    let iframe_count = content.iframes.len();
    let blockquote_count = content.blockquotes.len();

    let categories = if input.categories.is_empty() {
        "(no categories configured, leave both category fields empty)".to_string()
    } else {
        input.categories.join(", ")
    };
    let images = numbered_tags(&content.images, |src| format!(r#"<img src="{src}">"#));
    let iframes = numbered_tags(&content.iframes, |src| format!(r#"<iframe src="{src}"></iframe>"#));

    format!(
        r#"You are a senior news editor. Rewrite the article supplied by the user as an original, SEO-optimised article.

Write the entire article in this language: {language}.

Editorial instructions from the publisher:
{instruction}

Pick primary_category and secondary_category only from this list: {categories}

Media rules:
1. The text contains {image_count} {IMAGE_TOKEN} placeholder(s). Replace them, in order, with these image tags exactly as written:
{images}
2. The text contains {iframe_count} {IFRAME_TOKEN} placeholder(s). Replace them, in order, with these iframe tags exactly as written:
{iframes}
3. The text contains {blockquote_count} {BLOCKQUOTE_TOKEN} placeholder(s). Keep every {BLOCKQUOTE_TOKEN} literally, in its original relative position. Your output must contain exactly {blockquote_count} of them.
4. Do not add, remove, duplicate or reorder any image, iframe or blockquote.

Formatting rules:
- Paragraph text may contain inline HTML such as <strong>, <em>, <a>, <img> and <iframe>.
- Never use markdown and never use backticks.
- Respond with a single JSON object and nothing else.

The JSON object must have exactly this shape:
{{
  "title": "string",
  "sections": [
    {{ "heading": "string", "paragraphs": ["string"] }}
  ],
  "seo_title": "string",
  "meta_title": "string",
  "meta_description": "string",
  "meta_keywords": "comma separated keywords",
  "summary": "string",
  "primary_category": "string",
  "secondary_category": "string"
}}"#,
        language = input.language,
        instruction = input.instruction.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sanitizer::sanitize;

    #[test]
    fn test_prompt_lists_media_in_order_with_counts() {
        let content = sanitize(
            r#"<p>a</p><img src="one.jpg"><iframe src="https://v.example/x"></iframe><img src="two.jpg"><blockquote>q</blockquote>"#,
            None,
        );
        let categories = vec!["Politics".to_string(), "Economy".to_string()];
        let prompt = build_system_prompt(&PromptInput {
            language: "de",
            categories: &categories,
            instruction: "  Keep it neutral.  ",
            content: &content,
        });

        assert!(prompt.contains("this language: de."));
        assert!(prompt.contains("Keep it neutral.\n"));
        assert!(prompt.contains("Politics, Economy"));
        assert!(prompt.contains("contains 2 [IMAGE] placeholder(s)"));
        assert!(prompt.contains("contains 1 [IFRAME] placeholder(s)"));
        assert!(prompt.contains("exactly 1 of them"));

        let first = prompt.find(r#"1. <img src="one.jpg">"#).unwrap();
        let second = prompt.find(r#"2. <img src="two.jpg">"#).unwrap();
        assert!(first < second);
        assert!(prompt.contains(r#"<iframe src="https://v.example/x"></iframe>"#));
        assert!(prompt.contains("never use backticks"));
        assert!(prompt.contains(r#""secondary_category": "string""#));
    }

    #[test]
    fn test_prompt_without_media_or_categories() {
        let content = sanitize("<p>plain</p>", None);
        let prompt = build_system_prompt(&PromptInput {
            language: "en",
            categories: &[],
            instruction: "Shorten.",
            content: &content,
        });
        assert!(prompt.contains("contains 0 [IMAGE] placeholder(s)"));
        assert!(prompt.contains("   (none)"));
        assert!(prompt.contains("leave both category fields empty"));
    }
}
