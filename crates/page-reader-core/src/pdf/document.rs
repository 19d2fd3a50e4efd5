use std::path::Path;
use std::sync::Arc;

use mupdf::{Document as MuDocument, MetadataName};

use crate::error::{Error, Result};

/// Thread-safe wrapper around a PDF file
pub struct PdfDocument {
    /// The raw PDF bytes, reopened per operation
    bytes: Arc<Vec<u8>>,
    /// Title from the document info dictionary, if any
    title: Option<String>,
    /// Number of pages
    page_count: usize,
    /// Content-based ID (MD5 hex), computed once on load
    content_id: String,
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        // Open document to extract metadata and page count
        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::DocumentOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc.page_count()
            .map_err(|e| Error::DocumentOpen(format!("Failed to get page count: {e}")))?;

        // mupdf returns empty string if not present
        let title = doc.metadata(MetadataName::Title).ok().filter(|s| !s.trim().is_empty());

        let content_id = format!("{:x}", md5::compute(&bytes));

        Ok(Self {
            bytes: Arc::new(bytes),
            title,
            page_count: usize::try_from(page_count).unwrap_or(0),
            content_id,
        })
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::DocumentOpen(format!("Failed to read file {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Get number of pages
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Get raw PDF bytes as a slice.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Open the document for operations (creates a temporary handle)
    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::DocumentOpen(format!("Failed to open document: {e}")))
    }

    /// Stable identifier derived from the file content.
    pub fn content_id(&self) -> &str {
        &self.content_id
    }
}

impl Clone for PdfDocument {
    /// O(1): only the `Arc` around the bytes is cloned.
    fn clone(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            title: self.title.clone(),
            page_count: self.page_count,
            content_id: self.content_id.clone(),
        }
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("title", &self.title)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}
