//! Placeholder page text and the "is this real content" predicate.
//!
//! Ingestion, the OCR pipeline and the coordinator all go through this module
//! so the sentinel format is defined exactly once.
//!
//! A placeholder is `[[page-reader:<kind>]] <human text>`. Detection is purely
//! structural (prefix match); page text is never sniffed for content.

/// Prefix shared by every placeholder string
pub const PLACEHOLDER_PREFIX: &str = "[[page-reader:";

/// Trimmed text shorter than this is not worth detecting or translating
pub const MIN_CONTENT_CHARS: usize = 10;

const PENDING_TAG: &str = "[[page-reader:ocr-pending]]";
const FAILED_TAG: &str = "[[page-reader:ocr-failed]]";

/// Kind of synthetic page text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// No extractable text yet; OCR may still produce some
    Pending,
    /// OCR ran and failed for this page
    Failed,
}

/// Placeholder for a page whose text is not available yet.
pub fn placeholder_pending(page: usize) -> String {
    format!("{PENDING_TAG} Page {page} is waiting for text recognition")
}

/// Placeholder for a page whose recognition failed.
pub fn placeholder_failed(page: usize, reason: &str) -> String {
    format!("{FAILED_TAG} Page {page} could not be recognized: {reason}")
}

/// Classify `text` as a placeholder, if it is one.
pub fn placeholder_kind(text: &str) -> Option<Placeholder> {
    let text = text.trim_start();
    if text.starts_with(PENDING_TAG) {
        Some(Placeholder::Pending)
    } else if text.starts_with(FAILED_TAG) {
        Some(Placeholder::Failed)
    } else {
        None
    }
}

/// True if `text` is a sentinel of either kind (leading whitespace ignored).
pub fn is_placeholder(text: &str) -> bool {
    text.trim_start().starts_with(PLACEHOLDER_PREFIX)
}

/// True iff `text` is eligible for language detection and translation.
pub fn is_real_content(text: &str) -> bool {
    let trimmed = text.trim();
    !is_placeholder(trimmed) && trimmed.chars().count() >= MIN_CONTENT_CHARS
}
