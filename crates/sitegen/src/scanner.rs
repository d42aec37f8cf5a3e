//! Block scanning over the accumulated model output.
//!
//! The scanner is stateless: every call re-derives the blocks from the whole
//! buffer, so calling it on a growing prefix of the same stream always agrees
//! with what a from-scratch scan of that prefix would produce.
//!
//! # Example
//!
//! ```
//! use sitegen::protocol::BlockKind;
//! use sitegen::scanner::scan;
//!
//! let buffer = "<<<<<<< START_TITLE index.html >>>>>>> END_TITLE\n<!DOCTYPE html>";
//! let blocks = scan(buffer);
//! assert_eq!(blocks.len(), 1);
//! assert_eq!(blocks[0].kind, BlockKind::Title);
//! assert_eq!(blocks[0].path, "index.html");
//! assert!(blocks[0].provisional);
//! ```

use crate::protocol::{BlockKind, NEW_PAGE_START, TITLE_PAGE_START, UPDATE_PAGE_START};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Matches a complete block header and captures the page path.
///
/// One alternative per kind so a start delimiter can only pair with its own
/// end delimiter.
static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = BlockKind::ALL
        .into_iter()
        .map(|kind| {
            format!(
                r"(?:({start})(\S+)\s*{end})",
                start = regex::escape(kind.start_delimiter()),
                end = regex::escape(kind.end_delimiter().trim_start()),
            )
        })
        .collect();
    Regex::new(&alternatives.join("|")).unwrap()
});

/// Matches any start delimiter, complete header or not.
static START_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives: Vec<String> = BlockKind::ALL
        .into_iter()
        .map(|kind| regex::escape(kind.start_delimiter()))
        .collect();
    Regex::new(&alternatives.join("|")).unwrap()
});

/// One delimited block found in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Block<'a> {
    pub kind: BlockKind,
    pub path: &'a str,
    /// Text between the end of the header and the next start delimiter.
    pub content: &'a str,
    /// Set on the last block when no start delimiter follows it; its content
    /// may still grow as more of the stream arrives.
    pub provisional: bool,
}

/// Finds every complete block header in `buffer`, in order of appearance.
///
/// Returns an empty list while the buffer holds no complete header yet; that
/// is a wait state, not an error.
pub fn scan(buffer: &str) -> Vec<Block<'_>> {
    let starts: Vec<usize> = START_RE.find_iter(buffer).map(|m| m.start()).collect();
    if starts.is_empty() {
        return Vec::new();
    }

    let mut blocks = Vec::new();
    for caps in HEADER_RE.captures_iter(buffer) {
        let Some(header) = caps.get(0) else {
            continue;
        };
        // Groups come in (start, path) pairs, one pair per kind.
        let Some((kind, path)) = (0..BlockKind::ALL.len()).find_map(|i| {
            let start = caps.get(1 + 2 * i)?;
            let path = caps.get(2 + 2 * i)?;
            let kind = BlockKind::from_start_delimiter(start.as_str())?;
            Some((kind, path.as_str().trim()))
        }) else {
            continue;
        };

        let content_start = header.end();
        let next_start = starts.iter().copied().find(|&s| s >= content_start);
        let (content_end, provisional) = match next_start {
            Some(end) => (end, false),
            None => (hold_back_partial_delimiter(buffer, content_start), true),
        };

        // SAFETY: both bounds come from regex match offsets or from the
        // char-boundary-checked hold back, so they are valid UTF-8 boundaries.
        #[allow(clippy::string_slice)]
        let content = &buffer[content_start..content_end];

        blocks.push(Block {
            kind,
            path,
            content,
            provisional,
        });
    }

    blocks
}

/// Returns true if `buffer` contains a start delimiter of `kind`, complete
/// header or not.
pub fn contains_start_delimiter(buffer: &str, kind: BlockKind) -> bool {
    buffer.contains(kind.start_delimiter())
}

/// End offset for the trailing block that excludes a suffix which could be
/// the beginning of a start delimiter still being streamed.
fn hold_back_partial_delimiter(buffer: &str, content_start: usize) -> usize {
    let len = buffer.len();
    let longest = [TITLE_PAGE_START, NEW_PAGE_START, UPDATE_PAGE_START]
        .iter()
        .map(|d| d.len())
        .max()
        .unwrap_or(0);
    let max_tail = longest.saturating_sub(1).min(len - content_start);

    for tail_len in (1..=max_tail).rev() {
        let at = len - tail_len;
        if !buffer.is_char_boundary(at) {
            continue;
        }
        #[allow(clippy::string_slice)]
        let tail = &buffer[at..];
        if BlockKind::ALL
            .into_iter()
            .any(|kind| kind.start_delimiter().starts_with(tail))
        {
            return at;
        }
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const TWO_PAGES: &str = "Sure! Here is your site.\n\
        <<<<<<< START_TITLE index.html >>>>>>> END_TITLE\n\
        ```html\n<!DOCTYPE html><html><body>home</body></html>\n```\n\
        <<<<<<< START_TITLE about.html >>>>>>> END_TITLE\n\
        ```html\n<!DOCTYPE html><html><body>about</body></html>\n```\n";

    #[test]
    fn finds_blocks_in_order_with_content_spans() {
        let blocks = scan(TWO_PAGES);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].path, "index.html");
        assert!(blocks[0].content.contains("home"));
        assert!(!blocks[0].content.contains("about"));
        assert!(!blocks[0].provisional);
        assert_eq!(blocks[1].path, "about.html");
        assert!(blocks[1].provisional);
    }

    #[test_case("" ; "empty buffer")]
    #[test_case("Let me think about the layout first..." ; "prose only")]
    #[test_case("<<<<<<< START_TITLE index.ht" ; "header still streaming")]
    #[test_case("<<<<<<< SEARCH\na\n=======\nb\n>>>>>>> REPLACE" ; "bare directive")]
    fn no_blocks_until_a_header_completes(buffer: &str) {
        assert!(scan(buffer).is_empty());
    }

    #[test]
    fn mixed_kinds_split_at_any_start_delimiter() {
        let buffer = "<<<<<<< UPDATE_PAGE_START index.html >>>>>>> UPDATE_PAGE_END\n\
            <<<<<<< SEARCH\n<h1>Old</h1>\n=======\n<h1>New</h1>\n>>>>>>> REPLACE\n\
            <<<<<<< NEW_PAGE_START contact.html >>>>>>> NEW_PAGE_END\n\
            <!DOCTYPE html><html></html>";
        let blocks = scan(buffer);
        let kinds: Vec<_> = blocks.iter().map(|b| (b.kind, b.path)).collect();
        assert_eq!(
            kinds,
            vec![
                (BlockKind::UpdatePage, "index.html"),
                (BlockKind::NewPage, "contact.html"),
            ]
        );
        assert!(blocks[0].content.ends_with(">>>>>>> REPLACE\n"));
    }

    #[test]
    fn start_delimiter_must_pair_with_its_own_end() {
        let buffer = "<<<<<<< START_TITLE index.html >>>>>>> NEW_PAGE_END\nbody";
        assert!(scan(buffer).is_empty());
    }

    #[test]
    fn partial_next_header_ends_previous_block() {
        let buffer = "<<<<<<< START_TITLE index.html >>>>>>> END_TITLE\nhome\n\
            <<<<<<< START_TITLE abo";
        let blocks = scan(buffer);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "\nhome\n");
        assert!(!blocks[0].provisional);
    }

    #[test_case("<", "\nhome\n" ; "single angle bracket")]
    #[test_case("<<<<<<< NEW_PA", "\nhome\n" ; "partial new page")]
    #[test_case("<<<<<<< ", "\nhome\n" ; "shared prefix")]
    #[test_case("</html>", "\nhome\n</html>" ; "closing tag is kept")]
    fn trailing_partial_delimiter_is_held_back(tail: &str, expected: &str) {
        let buffer = format!("<<<<<<< START_TITLE index.html >>>>>>> END_TITLE\nhome\n{tail}");
        let blocks = scan(&buffer);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, expected);
    }

    #[test]
    fn rescanning_a_growing_prefix_keeps_completed_blocks() {
        let full = scan(TWO_PAGES);
        for end in (0..=TWO_PAGES.len()).filter(|&i| TWO_PAGES.is_char_boundary(i)) {
            let prefix = &TWO_PAGES[..end];
            for block in scan(prefix).iter().filter(|b| !b.provisional) {
                assert!(
                    full.contains(block),
                    "completed block changed at prefix length {end}: {block:?}"
                );
            }
        }
    }

    #[test]
    fn path_with_extra_whitespace_before_end() {
        let buffer = "<<<<<<< NEW_PAGE_START pricing.html   >>>>>>> NEW_PAGE_END\nx";
        let blocks = scan(buffer);
        assert_eq!(blocks[0].path, "pricing.html");
        assert!(contains_start_delimiter(buffer, BlockKind::NewPage));
        assert!(!contains_start_delimiter(buffer, BlockKind::UpdatePage));
    }
}
