//! Merging scanned blocks into a page collection.
//!
//! Reconciliation is a pure function of the collection the generation started
//! from and the text received so far. Running it again on a longer prefix of
//! the same stream simply supersedes the previous result.

use crate::extract::extract_page_html;
use crate::pages::{Page, PageCollection, DEFAULT_HOME_PATHS};
use crate::patch::{apply_directives, parse_directives, LineRange, PatchOutcome};
use crate::protocol::BlockKind;
use crate::scanner::{contains_start_delimiter, scan, Block};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the caller asked the model to respond. Chosen up front, never inferred
/// from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    /// Whole site (re)generated from `START_TITLE` blocks.
    FullRegeneration,
    /// One `START_TITLE` page added to an existing site.
    NewPage,
    /// Follow-up edits through update blocks, possibly adding new pages.
    IncrementalPatch,
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationMode::FullRegeneration => "full",
            GenerationMode::NewPage => "new-page",
            GenerationMode::IncrementalPatch => "patch",
        };
        f.write_str(name)
    }
}

/// Counters for everything a pass skipped or applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub blocks_seen: usize,
    /// Page blocks whose content has no document yet.
    pub blocks_pending: usize,
    /// Blocks of a kind the current mode does not consume.
    pub blocks_ignored: usize,
    pub pages_extracted: usize,
    pub directives_applied: usize,
    pub directives_missing: usize,
    /// Update blocks (or a legacy patch) naming a page that does not exist.
    pub targets_missing: usize,
    pub legacy_fallback: bool,
}

impl ReconcileStats {
    fn record_patch(&mut self, applied: usize, missing: usize) {
        self.directives_applied += applied;
        self.directives_missing += missing;
    }
}

/// The state a single pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub pages: PageCollection,
    pub active_page: Option<String>,
    pub updated_lines: Vec<LineRange>,
    pub stats: ReconcileStats,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    mode: GenerationMode,
    home_paths: Vec<String>,
}

impl Reconciler {
    pub fn new(mode: GenerationMode) -> Self {
        Self {
            mode,
            home_paths: DEFAULT_HOME_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_home_paths(mut self, home_paths: Vec<String>) -> Self {
        self.home_paths = home_paths;
        self
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    /// Rebuilds the page state from `base` and everything received so far.
    pub fn reconcile(&self, base: &PageCollection, content: &str) -> Reconciliation {
        let blocks = scan(content);
        let mut result = Reconciliation {
            pages: base.clone(),
            stats: ReconcileStats {
                blocks_seen: blocks.len(),
                ..ReconcileStats::default()
            },
            ..Reconciliation::default()
        };

        match self.mode {
            GenerationMode::FullRegeneration => self.full_regeneration(&blocks, &mut result),
            GenerationMode::NewPage => self.new_page(&blocks, &mut result),
            GenerationMode::IncrementalPatch => self.incremental_patch(&blocks, content, &mut result),
        }

        result
    }

    fn full_regeneration(&self, blocks: &[Block<'_>], result: &mut Reconciliation) {
        let mut generated = PageCollection::new();
        for block in blocks {
            if block.kind != BlockKind::Title {
                result.stats.blocks_ignored += 1;
                continue;
            }
            match extract_page_html(block.content) {
                Some(html) => {
                    generated.upsert(Page::new(block.path, html));
                    result.stats.pages_extracted += 1;
                    result.active_page = Some(block.path.to_string());
                }
                None => {
                    tracing::debug!(path = block.path, "page block has no document yet");
                    result.stats.blocks_pending += 1;
                }
            }
        }

        if !generated.is_empty() {
            result.pages = generated;
        }
    }

    fn new_page(&self, blocks: &[Block<'_>], result: &mut Reconciliation) {
        // Some models announce the page with a new-page header instead.
        let candidate = blocks
            .iter()
            .find(|b| b.kind == BlockKind::Title)
            .or_else(|| blocks.iter().find(|b| b.kind == BlockKind::NewPage));

        result.stats.blocks_ignored = blocks.len() - usize::from(candidate.is_some());
        let Some(block) = candidate else {
            return;
        };

        match extract_page_html(block.content) {
            Some(html) => {
                result.pages.upsert(Page::new(block.path, html));
                result.stats.pages_extracted = 1;
                result.active_page = Some(block.path.to_string());
            }
            None => result.stats.blocks_pending = 1,
        }
    }

    fn incremental_patch(&self, blocks: &[Block<'_>], content: &str, result: &mut Reconciliation) {
        let wrapped = contains_start_delimiter(content, BlockKind::UpdatePage)
            || contains_start_delimiter(content, BlockKind::NewPage);
        if !wrapped {
            self.legacy_patch(content, result);
            return;
        }

        let mut last_updated = None;
        let mut last_created = None;
        for block in blocks {
            match block.kind {
                BlockKind::UpdatePage => {
                    let Some(page) = result.pages.get_mut(block.path) else {
                        tracing::debug!(path = block.path, "update targets unknown page, skipping");
                        result.stats.targets_missing += 1;
                        continue;
                    };
                    let directives = parse_directives(block.content);
                    let PatchOutcome {
                        html,
                        ranges,
                        applied,
                        missing,
                    } = apply_directives(&page.html, &directives);
                    page.html = html;
                    result.stats.record_patch(applied, missing);
                    result.updated_lines.extend(ranges);
                    last_updated = Some(block.path);
                }
                BlockKind::NewPage => match extract_page_html(block.content) {
                    Some(html) => {
                        result.pages.upsert(Page::new(block.path, html));
                        result.stats.pages_extracted += 1;
                        last_created = Some(block.path);
                    }
                    None => result.stats.blocks_pending += 1,
                },
                BlockKind::Title => result.stats.blocks_ignored += 1,
            }
        }

        result.active_page = last_created.or(last_updated).map(str::to_string);
    }

    fn legacy_patch(&self, content: &str, result: &mut Reconciliation) {
        if parse_directives(content).is_empty() {
            return;
        }
        result.stats.legacy_fallback = true;

        match apply_legacy_patch(&mut result.pages, content, &self.home_paths) {
            Some(patch) => {
                result.stats.record_patch(patch.applied, patch.missing);
                result.updated_lines = patch.ranges;
                result.active_page = Some(patch.home);
            }
            None => {
                tracing::debug!("bare directives but no home page to apply them to");
                result.stats.targets_missing += 1;
            }
        }
    }
}

/// What [`apply_legacy_patch`] did to the home page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPatch {
    pub home: String,
    pub ranges: Vec<LineRange>,
    pub applied: usize,
    pub missing: usize,
}

/// Applies directives found anywhere in `content` to the home page.
///
/// Handles models that answer a follow-up with bare search/replace blocks and
/// no page wrapper. Returns `None` when the collection has no home page.
pub fn apply_legacy_patch<S: AsRef<str>>(
    pages: &mut PageCollection,
    content: &str,
    home_paths: &[S],
) -> Option<LegacyPatch> {
    let home = pages.home_path(home_paths)?.to_string();
    let page = pages.get_mut(&home)?;

    let directives = parse_directives(content);
    let PatchOutcome {
        html,
        ranges,
        applied,
        missing,
    } = apply_directives(&page.html, &directives);
    page.html = html;

    Some(LegacyPatch {
        home,
        ranges,
        applied,
        missing,
    })
}
