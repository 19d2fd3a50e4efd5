//! Page index newtype bridging reader page numbers and mupdf indices.
//!
//! The reader numbers pages from 1 (`usize`); mupdf loads pages by a 0-based
//! `i32`. All conversions go through here.

use std::fmt;

use crate::error::Error;

/// A 0-based page index that can be safely passed to mupdf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(i32);

impl PageIndex {
    /// Get the underlying i32 value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// The 1-based page number this index refers to.
    #[must_use]
    #[allow(clippy::cast_sign_loss)] // Never negative: only built from validated page numbers
    pub const fn page_number(self) -> usize {
        self.0 as usize + 1
    }

    /// Convert a 1-based page number into an index.
    ///
    /// Fails if the number is 0, exceeds the page count, or does not fit in an i32.
    pub fn from_page_number(page: usize, total_pages: usize) -> Result<Self, Error> {
        if page == 0 || page > total_pages {
            return Err(Error::InvalidPage { page, total: total_pages });
        }

        let index = i32::try_from(page - 1)
            .map_err(|_| Error::InvalidPage { page, total: total_pages })?;

        Ok(Self(index))
    }
}

impl From<PageIndex> for i32 {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_is_index_zero() {
        let idx = PageIndex::from_page_number(1, 10).unwrap();
        assert_eq!(idx.as_i32(), 0);
        assert_eq!(idx.page_number(), 1);
    }

    #[test]
    fn test_last_page() {
        let idx = PageIndex::from_page_number(10, 10).unwrap();
        let value: i32 = idx.into();
        assert_eq!(value, 9);
    }

    #[test]
    fn test_out_of_range() {
        assert!(PageIndex::from_page_number(0, 5).is_err());
        assert!(PageIndex::from_page_number(6, 5).is_err());
    }

    #[test]
    fn test_display() {
        let idx = PageIndex::from_page_number(8, 8).unwrap();
        assert_eq!(format!("{idx}"), "7");
    }
}
