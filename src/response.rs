//! Helpers for pulling structured fields out of free-text model output.
//!
//! Every prompt asks the model to wrap its answer in tags such as
//! `<response>...</response>`. Models often add reasoning blocks or code
//! fences around that, so responses are cleaned before extraction.

use crate::error::ParseError;
use regex::Regex;
use std::sync::LazyLock;

/// Reasoning blocks some models emit before the answer.
static THINK_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(think|thinking|thoughts)>.*?</(think|thinking|thoughts)>")
        .expect("Invalid THINK_BLOCK_REGEX")
});

/// Markdown code fence lines.
static CODE_FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*```[a-zA-Z]*\s*$").expect("Invalid CODE_FENCE_REGEX"));

/// Strips reasoning blocks and code fence markers.
pub fn clean(raw: &str) -> String {
    let without_thinking = THINK_BLOCK_REGEX.replace_all(raw, "");
    CODE_FENCE_REGEX
        .replace_all(&without_thinking, "")
        .trim()
        .to_string()
}

/// Returns the trimmed content of the first `<tag>...</tag>` in `text`.
///
/// Empty content counts as absent.
pub fn extract_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    let content = text[start..end].trim();

    (!content.is_empty()).then_some(content)
}

/// Like [`extract_tag`] but reports a missing tag as a [`ParseError`].
pub fn require_tag<'a>(text: &'a str, tag: &str) -> Result<&'a str, ParseError> {
    extract_tag(text, tag).ok_or_else(|| ParseError::MissingTag(tag.to_string()))
}

/// The body of the `<response>` envelope.
///
/// Falls back to the whole cleaned text when the envelope is missing, since
/// models frequently drop it on long answers. An empty result is an error.
pub fn response_body(raw: &str) -> Result<String, ParseError> {
    let cleaned = clean(raw);
    let body = match extract_tag(&cleaned, "response") {
        Some(inner) => inner.to_string(),
        None => strip_dangling_tags(&cleaned),
    };

    if body.is_empty() {
        Err(ParseError::MissingTag("response".to_string()))
    } else {
        Ok(body)
    }
}

/// Removes a lone opening or closing `<response>` tag left by a truncated reply.
fn strip_dangling_tags(text: &str) -> String {
    text.replace("<response>", "")
        .replace("</response>", "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tag() {
        let text = "<response><style> fantasy </style><chapters>8</chapters></response>";
        assert_eq!(extract_tag(text, "style"), Some("fantasy"));
        assert_eq!(extract_tag(text, "chapters"), Some("8"));
        assert_eq!(extract_tag(text, "explanation"), None);
    }

    #[test]
    fn test_extract_empty_tag_is_absent() {
        assert_eq!(extract_tag("<title>  </title>", "title"), None);
        assert!(matches!(
            require_tag("<title></title>", "title"),
            Err(ParseError::MissingTag(tag)) if tag == "title"
        ));
    }

    #[test]
    fn test_extract_multiline() {
        let text = "<response>\nline one\nline two\n</response>";
        assert_eq!(extract_tag(text, "response"), Some("line one\nline two"));
    }

    #[test]
    fn test_clean_removes_thinking_and_fences() {
        let raw = "<think>hmm, let me plan</think>\n```xml\n<response>ok</response>\n```";
        assert_eq!(clean(raw), "<response>ok</response>");
    }

    #[test]
    fn test_response_body_without_envelope() {
        assert_eq!(response_body("Plain prose.").unwrap(), "Plain prose.");
        assert_eq!(
            response_body("<response>Cut off mid").unwrap(),
            "Cut off mid"
        );
    }

    #[test]
    fn test_response_body_empty() {
        assert!(response_body("<response>   </response>").is_err());
        assert!(response_body("<think>only thinking</think>").is_err());
    }
}
