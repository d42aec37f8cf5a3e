//! Turns the raw content of a page block into a renderable HTML document.

use crate::protocol::{CODE_FENCE, DOCTYPE_MARKER};
use regex::Regex;
use std::sync::LazyLock;

static HEAD_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<head[\s>]").unwrap());
static BODY_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<body[\s>]").unwrap());

/// Extracts the page document from a block's content.
///
/// Everything before the first `<!DOCTYPE html>` is dropped, markdown fences
/// are removed and a truncated document gets its missing closing tags.
/// Returns `None` while no doctype has arrived; the caller skips the block
/// for this pass.
pub fn extract_page_html(content: &str) -> Option<String> {
    let start = content.find(DOCTYPE_MARKER)?;
    // SAFETY: `find` returns the byte offset of an ASCII marker.
    #[allow(clippy::string_slice)]
    let document = &content[start..];

    let unfenced = document.replace(CODE_FENCE, "");
    // A fence may still be arriving one backtick at a time.
    let unfenced = unfenced.trim_end_matches(|c: char| c == '`' || c.is_whitespace());
    if unfenced.is_empty() {
        return None;
    }

    Some(complete_document(unfenced))
}

/// Appends the closing tags a truncated document is missing, in document
/// order: `</head>`, `</body>`, `</html>`.
///
/// An open `<head>` implies the body was never reached, so it also gets a
/// `</body>` even though no `<body>` tag was seen.
pub fn complete_document(html: &str) -> String {
    let mut completed = html.to_string();

    let head_left_open = HEAD_OPEN_RE.is_match(html) && !html.contains("</head>");
    if head_left_open {
        completed.push_str("\n</head>");
    }

    let body_left_open = BODY_OPEN_RE.is_match(html) && !html.contains("</body>");
    if body_left_open || (head_left_open && !html.contains("</body>")) {
        completed.push_str("\n</body>");
    }

    if !html.contains("</html>") {
        completed.push_str("\n</html>");
    }

    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("" ; "empty")]
    #[test_case("I'll build a landing page with a hero section." ; "prose")]
    #[test_case("```html\n<!doctype html><html></html>" ; "lowercase doctype")]
    fn not_ready_without_doctype(content: &str) {
        assert_eq!(extract_page_html(content), None);
    }

    #[test]
    fn drops_prose_and_fences() {
        let content = "\nHere you go:\n```html\n<!DOCTYPE html><html><head></head>\
            <body><h1>Hi</h1></body></html>\n```\n";
        assert_eq!(
            extract_page_html(content).as_deref(),
            Some("<!DOCTYPE html><html><head></head><body><h1>Hi</h1></body></html>")
        );
    }

    #[test]
    fn truncated_head_gets_closing_tags_in_order() {
        let html = extract_page_html("<!DOCTYPE html>\n<html>\n<head>\n<title>X</title>").unwrap();
        let head = html.find("</head>").unwrap();
        let body = html.find("</body>").unwrap();
        let end = html.find("</html>").unwrap();
        assert!(head < body && body < end, "{html}");
        assert!(html.starts_with("<!DOCTYPE html>\n<html>\n<head>\n<title>X</title>"));
    }

    #[test_case(
        "<!DOCTYPE html><html><head></head><body><p>par",
        "<!DOCTYPE html><html><head></head><body><p>par\n</body>\n</html>" ;
        "truncated body"
    )]
    #[test_case(
        "<!DOCTYPE html><html><body class=\"dark\">",
        "<!DOCTYPE html><html><body class=\"dark\">\n</body>\n</html>" ;
        "body with attributes"
    )]
    #[test_case(
        "<!DOCTYPE html><html><body><header>Top</header></body>",
        "<!DOCTYPE html><html><body><header>Top</header></body>\n</html>" ;
        "header element is not a head tag"
    )]
    #[test_case(
        "<!DOCTYPE html><html><head></head><body></body></html>",
        "<!DOCTYPE html><html><head></head><body></body></html>" ;
        "complete document untouched"
    )]
    fn completes_missing_structure(input: &str, expected: &str) {
        assert_eq!(complete_document(input), expected);
    }

    #[test]
    fn partial_closing_fence_is_trimmed() {
        let html = extract_page_html("<!DOCTYPE html><html></html>\n``").unwrap();
        assert_eq!(html, "<!DOCTYPE html><html></html>");
    }
}
