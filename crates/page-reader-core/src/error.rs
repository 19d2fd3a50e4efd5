use thiserror::Error;

/// Unified error type for page-reader-core
///
/// This enum covers every failure the library can report:
/// - Document operations (opening, text extraction, rasterizing)
/// - Translation backend calls
/// - OCR recognition and pipeline failures
/// - Progress persistence
/// - Configuration loading
///
/// Expected runtime conditions (a failed page translation, a failed OCR page)
/// never reach the reader as errors; the session resolves them into a
/// displayable state. These variants exist for the collaborators.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Document Errors
    // ==========================================================================
    /// Failed to open or parse a source document
    #[error("failed to open document: {0}")]
    DocumentOpen(String),

    /// Document has no pages at all
    #[error("document has no pages")]
    DocumentEmpty,

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    InvalidPage { page: usize, total: usize },

    /// Failed to extract text from a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// Failed to rasterize a PDF page
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    // ==========================================================================
    // Translation Errors
    // ==========================================================================
    /// Translation API request failed in a way worth retrying later
    #[error("translation request failed: {0}")]
    TranslationTransient(String),

    /// Translation backend answered with an error or an unusable body
    #[error("translation backend error: {0}")]
    TranslationBackend(String),

    /// Rate limited by translation API
    #[error("translation rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    TranslationRateLimited { retry_after: Option<u64> },

    /// Translation request timed out
    #[error("translation request timed out")]
    TranslationTimeout,

    /// Backend credentials or endpoint not configured
    #[error("translation backend not configured: {0}")]
    TranslationNotConfigured(String),

    // ==========================================================================
    // OCR Errors
    // ==========================================================================
    /// Recognition failed for a single page
    #[error("OCR failed on page {page}: {reason}")]
    OcrPage { page: usize, reason: String },

    /// Recognition backend request failed
    #[error("OCR request failed: {0}")]
    OcrRequest(String),

    /// OCR backend not configured
    #[error("OCR backend not configured: {0}")]
    OcrNotConfigured(String),

    // ==========================================================================
    // Persistence Errors
    // ==========================================================================
    /// Failed to open the progress database
    #[error("failed to open progress store: {0}")]
    StoreOpen(String),

    /// Failed to read from the progress database
    #[error("failed to read progress: {0}")]
    StoreRead(String),

    /// Failed to write to the progress database
    #[error("failed to write progress: {0}")]
    StoreWrite(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a translation call failed, as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Credentials or endpoint missing; retrying without reconfiguring is pointless
    ConfigMissing,
    /// Network trouble, timeouts, throttling, 5xx
    Transient,
    /// Backend rejected the request or answered with garbage
    BackendError,
}

impl Error {
    /// Classify a translation failure. Returns `None` for non-translation errors.
    pub const fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::TranslationNotConfigured(_) => Some(FailureReason::ConfigMissing),
            Self::TranslationTransient(_)
            | Self::TranslationRateLimited { .. }
            | Self::TranslationTimeout => Some(FailureReason::Transient),
            Self::TranslationBackend(_) => Some(FailureReason::BackendError),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_tags() {
        assert_eq!(
            Error::TranslationNotConfigured("model".into()).reason(),
            Some(FailureReason::ConfigMissing)
        );
        assert_eq!(Error::TranslationTimeout.reason(), Some(FailureReason::Transient));
        assert_eq!(
            Error::TranslationRateLimited { retry_after: Some(3) }.reason(),
            Some(FailureReason::Transient)
        );
        assert_eq!(
            Error::TranslationBackend("HTTP 400".into()).reason(),
            Some(FailureReason::BackendError)
        );
        assert_eq!(Error::DocumentEmpty.reason(), None);
    }

    #[test]
    fn test_rate_limit_message() {
        let e = Error::TranslationRateLimited { retry_after: Some(5) };
        assert_eq!(e.to_string(), "translation rate limited, retry after 5 seconds");
        let e = Error::TranslationRateLimited { retry_after: None };
        assert_eq!(e.to_string(), "translation rate limited");
    }
}
