//! Delimiter literals of the page/patch text protocol emitted by the model.
//!
//! Every literal contains characters that are regex metacharacters in some
//! contexts (`<`, `>`, `=`), so anything that builds a pattern from them must
//! go through [`regex::escape`].

use serde::{Deserialize, Serialize};

pub const TITLE_PAGE_START: &str = "<<<<<<< START_TITLE ";
pub const TITLE_PAGE_END: &str = " >>>>>>> END_TITLE";
pub const NEW_PAGE_START: &str = "<<<<<<< NEW_PAGE_START ";
pub const NEW_PAGE_END: &str = " >>>>>>> NEW_PAGE_END";
pub const UPDATE_PAGE_START: &str = "<<<<<<< UPDATE_PAGE_START ";
pub const UPDATE_PAGE_END: &str = " >>>>>>> UPDATE_PAGE_END";

pub const SEARCH_START: &str = "<<<<<<< SEARCH";
pub const DIVIDER: &str = "=======";
pub const REPLACE_END: &str = ">>>>>>> REPLACE";

pub const DOCTYPE_MARKER: &str = "<!DOCTYPE html>";
pub const CODE_FENCE: &str = "```";

/// The kind of page block a header introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// `START_TITLE`: a full page in a (re)generation response.
    Title,
    /// `NEW_PAGE_START`: a page added by a follow-up response.
    NewPage,
    /// `UPDATE_PAGE_START`: search/replace directives for an existing page.
    UpdatePage,
}

impl BlockKind {
    pub const ALL: [BlockKind; 3] = [BlockKind::Title, BlockKind::NewPage, BlockKind::UpdatePage];

    pub fn start_delimiter(self) -> &'static str {
        match self {
            BlockKind::Title => TITLE_PAGE_START,
            BlockKind::NewPage => NEW_PAGE_START,
            BlockKind::UpdatePage => UPDATE_PAGE_START,
        }
    }

    pub fn end_delimiter(self) -> &'static str {
        match self {
            BlockKind::Title => TITLE_PAGE_END,
            BlockKind::NewPage => NEW_PAGE_END,
            BlockKind::UpdatePage => UPDATE_PAGE_END,
        }
    }

    /// Maps the text captured by the header pattern back to a kind.
    pub(crate) fn from_start_delimiter(start: &str) -> Option<Self> {
        BlockKind::ALL
            .into_iter()
            .find(|kind| kind.start_delimiter() == start)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockKind::Title => "title",
            BlockKind::NewPage => "new_page",
            BlockKind::UpdatePage => "update_page",
        };
        f.write_str(name)
    }
}
