use serde::{Deserialize, Serialize};

/// Paths that designate the home page when no configuration overrides them.
pub const DEFAULT_HOME_PATHS: &[&str] = &["/", "/index", "index", "index.html"];

/// One named HTML document of the generated site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub path: String,
    pub html: String,
}

impl Page {
    pub fn new(path: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            html: html.into(),
        }
    }
}

/// Insertion-ordered set of pages keyed by path.
///
/// Order only matters for display; identity is the path, and at most one page
/// per path is ever stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCollection {
    pages: Vec<Page>,
}

impl PageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection, keeping the first position and last content of
    /// any duplicated path.
    pub fn from_pages(pages: impl IntoIterator<Item = Page>) -> Self {
        let mut collection = Self::new();
        for page in pages {
            collection.upsert(page);
        }
        collection
    }

    /// Replaces the page with the same path in place, or appends it.
    ///
    /// Returns `true` when an existing page was replaced.
    pub fn upsert(&mut self, page: Page) -> bool {
        match self.pages.iter_mut().find(|p| p.path == page.path) {
            Some(existing) => {
                *existing = page;
                true
            }
            None => {
                self.pages.push(page);
                false
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.path == path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Path of the first page whose path is one of `home_paths`.
    pub fn home_path<S: AsRef<str>>(&self, home_paths: &[S]) -> Option<&str> {
        self.pages
            .iter()
            .find(|p| home_paths.iter().any(|h| h.as_ref() == p.path))
            .map(|p| p.path.as_str())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().map(|p| p.path.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Page> {
        self.pages.iter()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn last(&self) -> Option<&Page> {
        self.pages.last()
    }

    pub fn as_slice(&self) -> &[Page] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }
}

impl From<Vec<Page>> for PageCollection {
    fn from(pages: Vec<Page>) -> Self {
        Self::from_pages(pages)
    }
}

impl<'a> IntoIterator for &'a PageCollection {
    type Item = &'a Page;
    type IntoIter = std::slice::Iter<'a, Page>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}
