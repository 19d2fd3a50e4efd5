//! In-memory page text for the open document.
//!
//! The page array is fixed at ingestion; entries are replaced whole, never
//! edited in place. Each page carries a revision counter so readers can tell
//! whether the text they based a decision on is still current.

use tracing::debug;

use crate::content::is_real_content;
use crate::document::Page;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Entry {
    page: Page,
    revision: u64,
}

/// Mutable page array: written by ingestion and OCR, read by the coordinator.
#[derive(Debug, Clone)]
pub struct PageStore {
    entries: Vec<Entry>,
}

impl PageStore {
    pub fn new(pages: Vec<Page>) -> Self {
        let entries = pages.into_iter().map(|page| Entry { page, revision: 0 }).collect();
        Self { entries }
    }

    pub fn total_pages(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, number: usize) -> Option<&Entry> {
        number.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn page(&self, number: usize) -> Option<&Page> {
        self.entry(number).map(|e| &e.page)
    }

    /// Raw text of a page (1-based)
    pub fn text(&self, number: usize) -> Option<&str> {
        self.page(number).map(|p| p.raw_text.as_str())
    }

    /// Number of times this page has been replaced since ingestion
    pub fn revision(&self, number: usize) -> u64 {
        self.entry(number).map_or(0, |e| e.revision)
    }

    pub fn is_real_content(&self, number: usize) -> bool {
        self.text(number).is_some_and(is_real_content)
    }

    /// Replace a page's text wholesale.
    pub fn replace(&mut self, number: usize, text: String) -> Result<()> {
        let total = self.entries.len();
        let entry = number
            .checked_sub(1)
            .and_then(|i| self.entries.get_mut(i))
            .ok_or(Error::InvalidPage { page: number, total })?;

        *entry = Entry {
            page: Page::new(number, text),
            revision: entry.revision + 1,
        };
        debug!("Replaced page {} text, rev {}", number, entry.revision);
        Ok(())
    }

    /// Nearest page with real content: forward from `from` first, then backward.
    pub fn nearest_real_content(&self, from: usize) -> Option<usize> {
        let total = self.entries.len();
        ((from + 1)..=total)
            .chain((1..from.min(total + 1)).rev())
            .find(|&n| self.is_real_content(n))
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.entries.iter().map(|e| &e.page)
    }
}
