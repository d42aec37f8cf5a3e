//! Search/replace directives and their application to page HTML.
//!
//! A directive looks like this in model output:
//!
//! ```text
//! <<<<<<< SEARCH
//! <h1>Old title</h1>
//! =======
//! <h1>New title</h1>
//! >>>>>>> REPLACE
//! ```
//!
//! Directives are applied one after another, each against the result of the
//! previous one. A search text that cannot be found is skipped without
//! aborting the rest of the batch.

use crate::protocol::{DIVIDER, REPLACE_END, SEARCH_START};
use serde::Serialize;

/// One search/replace instruction borrowed from the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
    pub search: &'a str,
    pub replace: &'a str,
}

impl<'a> Directive<'a> {
    pub fn new(search: &'a str, replace: &'a str) -> Self {
        Self { search, replace }
    }

    /// A blank search side means "insert at the top of the document".
    pub fn is_prepend(&self) -> bool {
        self.search.trim().is_empty()
    }
}

/// Inclusive, 1-based line span of replaced text in the patched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "[usize; 2]")]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl From<LineRange> for [usize; 2] {
    fn from(range: LineRange) -> Self {
        [range.start, range.end]
    }
}

/// Result of applying a batch of directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    pub html: String,
    pub ranges: Vec<LineRange>,
    pub applied: usize,
    /// Directives whose search text was not present when their turn came.
    pub missing: usize,
}

/// Finds every complete directive in `text`, left to right.
///
/// Discovery stops at the first directive that is missing its divider or its
/// replace marker; those are picked up once more text has arrived.
pub fn parse_directives(text: &str) -> Vec<Directive<'_>> {
    let mut directives = Vec::new();
    let mut position = 0;

    loop {
        let Some(search_start) = find_from(text, SEARCH_START, position) else {
            break;
        };
        let search_body = search_start + SEARCH_START.len();
        let Some(divider) = find_from(text, DIVIDER, search_body) else {
            break;
        };
        let replace_body = divider + DIVIDER.len();
        let Some(replace_end) = find_from(text, REPLACE_END, replace_body) else {
            break;
        };

        // SAFETY: every offset is the start or end of an ASCII marker found by
        // `str::find`, so all of them sit on char boundaries.
        #[allow(clippy::string_slice)]
        let (search, replace) = (
            &text[search_body..divider],
            &text[replace_body..replace_end],
        );
        let replace = strip_marker_newlines(replace);
        // A deletion takes the removed line's own break with it.
        let search = if replace.is_empty() {
            strip_leading_newline(search)
        } else {
            strip_marker_newlines(search)
        };
        directives.push(Directive::new(search, replace));

        position = replace_end + REPLACE_END.len();
    }

    directives
}

/// Applies a single directive to `document` in place.
///
/// Returns the affected line range, or `None` when the search text does not
/// occur in the document. Only the first occurrence is replaced.
pub fn apply_directive(document: &mut String, directive: &Directive<'_>) -> Option<LineRange> {
    let replace_lines = line_count(directive.replace);

    if directive.is_prepend() {
        *document = format!("{}\n{}", directive.replace, document);
        return Some(LineRange::new(1, replace_lines));
    }

    let at = document.find(directive.search)?;
    // SAFETY: `at` is a match offset returned by `str::find`.
    #[allow(clippy::string_slice)]
    let start = document[..at].matches('\n').count() + 1;
    document.replace_range(at..at + directive.search.len(), directive.replace);

    Some(LineRange::new(start, start + replace_lines - 1))
}

/// Applies `directives` in order, each against the output of the previous one.
pub fn apply_directives(document: &str, directives: &[Directive<'_>]) -> PatchOutcome {
    let mut outcome = PatchOutcome {
        html: document.to_string(),
        ..PatchOutcome::default()
    };

    for directive in directives {
        match apply_directive(&mut outcome.html, directive) {
            Some(range) => {
                outcome.ranges.push(range);
                outcome.applied += 1;
            }
            None => {
                tracing::debug!(
                    search_len = directive.search.len(),
                    "search text not found, skipping directive"
                );
                outcome.missing += 1;
            }
        }
    }

    outcome
}

/// Number of lines `text` occupies once inserted: one more than its newlines.
fn line_count(text: &str) -> usize {
    text.matches('\n').count() + 1
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack.get(from..)?.find(needle).map(|i| i + from)
}

/// Drops the line break that belongs to the marker line before the text and
/// the one that belongs to the marker line after it.
fn strip_marker_newlines(text: &str) -> &str {
    let text = strip_leading_newline(text);
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

fn strip_leading_newline(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn replaces_only_first_occurrence() {
        let mut doc = "a\nb\na\n".to_string();
        let range = apply_directive(&mut doc, &Directive::new("a", "X"));
        assert_eq!(doc, "X\nb\na\n");
        assert_eq!(range, Some(LineRange::new(1, 1)));
    }

    #[test]
    fn empty_search_prepends() {
        let mut doc = "old".to_string();
        let range = apply_directive(&mut doc, &Directive::new("", "Y\nZ"));
        assert_eq!(doc, "Y\nZ\nold");
        assert_eq!(range, Some(LineRange::new(1, 2)));
    }

    #[test]
    fn deletion_applied_twice_is_a_noop_the_second_time() {
        let deletion = Directive::new("line-to-remove\n", "");
        let outcome = apply_directives("keep\nline-to-remove\nend", &[deletion, deletion]);
        assert_eq!(outcome.html, "keep\nend");
        assert_eq!(outcome.ranges, vec![LineRange::new(2, 2)]);
        assert_eq!((outcome.applied, outcome.missing), (1, 1));
    }

    #[test_case("keep\nline-to-remove\nend", "keep\nend" ; "middle line")]
    #[test_case("line-to-remove\nkeep\n", "keep\n" ; "first line")]
    #[test_case("keep\r\nline-to-remove\r\nend", "keep\r\nend" ; "crlf document")]
    fn parsed_deletion_removes_the_whole_line(document: &str, expected: &str) {
        let text = if document.contains('\r') {
            "<<<<<<< SEARCH\r\nline-to-remove\r\n=======\r\n>>>>>>> REPLACE\r\n"
        } else {
            "<<<<<<< SEARCH\nline-to-remove\n=======\n>>>>>>> REPLACE\n"
        };
        let directives = parse_directives(text);
        assert!(!directives[0].is_prepend());

        let outcome = apply_directives(document, &directives);
        assert_eq!(outcome.html, expected);
        assert_eq!(outcome.applied, 1);
    }

    #[test_case("<p>one</p>", "<p>1</p>", 3, 3 ; "single line")]
    #[test_case("<p>one</p>", "<p>1</p>\n<p>uno</p>", 3, 4 ; "grows by a line")]
    #[test_case("<body>\n<p>one</p>", "<body>", 2, 2 ; "match spans lines")]
    fn line_range_is_measured_in_patched_document(
        search: &str,
        replace: &str,
        start: usize,
        end: usize,
    ) {
        let mut doc = "<html>\n<body>\n<p>one</p>\n</body>\n</html>".to_string();
        let range = apply_directive(&mut doc, &Directive::new(search, replace));
        assert_eq!(range, Some(LineRange::new(start, end)));
    }

    #[test]
    fn directives_apply_sequentially() {
        let directives = [
            Directive::new("<h1>A</h1>", "<h1>B</h1>"),
            Directive::new("<h1>B</h1>", "<h1>C</h1>"),
            Directive::new("<h1>A</h1>", "<h1>unreachable</h1>"),
        ];
        let outcome = apply_directives("<h1>A</h1>", &directives);
        assert_eq!(outcome.html, "<h1>C</h1>");
        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.missing, 1);
    }

    #[test]
    fn parses_directives_and_strips_marker_line_breaks() {
        let text = "<<<<<<< SEARCH\n<h1>Old</h1>\n=======\n<h1>New</h1>\n>>>>>>> REPLACE\n\
            some chatter\n\
            <<<<<<< SEARCH\n=======\n<meta charset=\"utf-8\">\n>>>>>>> REPLACE\n";
        let directives = parse_directives(text);
        assert_eq!(
            directives,
            vec![
                Directive::new("<h1>Old</h1>", "<h1>New</h1>"),
                Directive::new("", "<meta charset=\"utf-8\">"),
            ]
        );
        assert!(directives[1].is_prepend());
    }

    #[test_case("<<<<<<< SEARCH\n<h1>Old</h1>\n" ; "missing divider")]
    #[test_case("<<<<<<< SEARCH\n<h1>Old</h1>\n=======\n<h1>Ne" ; "missing replace end")]
    #[test_case("<<<<<<< SEARCH\n<h1>Old</h1>\n=======\n<h1>New</h1>\n>>>>>>> REPL" ; "partial replace end")]
    fn unterminated_directive_waits_for_more_text(tail: &str) {
        let text = format!("<<<<<<< SEARCH\na\n=======\nb\n>>>>>>> REPLACE\n{tail}");
        assert_eq!(parse_directives(&text), vec![Directive::new("a", "b")]);
    }

    #[test]
    fn crlf_marker_lines() {
        let text = "<<<<<<< SEARCH\r\nold\r\n=======\r\nnew\r\n>>>>>>> REPLACE";
        assert_eq!(parse_directives(text), vec![Directive::new("old", "new")]);
    }

    #[test]
    fn line_range_serializes_as_pair() {
        let json = serde_json::to_string(&vec![LineRange::new(3, 5)]).unwrap();
        assert_eq!(json, "[[3,5]]");
    }
}
