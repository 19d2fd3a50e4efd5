//! Reading progress and document persistence.

use async_trait::async_trait;
use sled::{Db, Tree};
use std::path::Path;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{Error, Result};

/// Persists reading position and document contents across sessions.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Record the page the reader is on
    async fn save_progress(&self, document_id: &str, page: usize) -> Result<()>;

    /// Load a stored document, with the last saved page applied
    async fn load_document(&self, document_id: &str) -> Result<Option<Document>>;

    /// Store the document (pages, languages, bookmark)
    async fn save_document(&self, document: &Document) -> Result<()>;
}

/// Progress store backed by sled.
///
/// Documents are kept as JSON in one tree, reading positions in another so
/// page turns don't rewrite the whole document.
pub struct SledProgressStore {
    db: Db,
    documents: Tree,
    progress: Tree,
}

impl SledProgressStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreOpen(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let err_str = e.to_string();
            if err_str.contains("WouldBlock") || err_str.contains("lock") {
                Error::StoreOpen(format!(
                    "Progress database locked at {}\n\n\
                    Another reader is open on it, or a previous instance crashed.\n\
                    To fix: rm {}/db/LOCK",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::StoreOpen(format!("Failed to open {}: {}", path.display(), e))
            }
        })?;

        let documents = db
            .open_tree("documents")
            .map_err(|e| Error::StoreOpen(e.to_string()))?;
        let progress = db
            .open_tree("progress")
            .map_err(|e| Error::StoreOpen(e.to_string()))?;

        debug!("Opened progress store at {}", path.display());

        Ok(Self { db, documents, progress })
    }

    fn saved_page(&self, document_id: &str) -> Option<usize> {
        match self.progress.get(document_id.as_bytes()) {
            Ok(Some(value)) => {
                let bytes: [u8; 8] = value.as_ref().try_into().ok()?;
                usize::try_from(u64::from_be_bytes(bytes)).ok()
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Progress read error: {}", e);
                None
            }
        }
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| Error::StoreWrite(format!("Flush failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for SledProgressStore {
    async fn save_progress(&self, document_id: &str, page: usize) -> Result<()> {
        let page = u64::try_from(page).map_err(|e| Error::StoreWrite(e.to_string()))?;
        self.progress
            .insert(document_id.as_bytes(), page.to_be_bytes().to_vec())
            .map_err(|e| Error::StoreWrite(e.to_string()))?;
        self.flush().await
    }

    async fn load_document(&self, document_id: &str) -> Result<Option<Document>> {
        let Some(value) = self
            .documents
            .get(document_id.as_bytes())
            .map_err(|e| Error::StoreRead(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut document: Document = serde_json::from_slice(&value)
            .map_err(|e| Error::StoreRead(format!("corrupt document {document_id}: {e}")))?;

        if let Some(page) = self.saved_page(document_id) {
            document.current_page = page;
        }
        Ok(Some(document))
    }

    async fn save_document(&self, document: &Document) -> Result<()> {
        let json = serde_json::to_vec(document).map_err(|e| Error::StoreWrite(e.to_string()))?;
        self.documents
            .insert(document.id.as_bytes(), json)
            .map_err(|e| Error::StoreWrite(e.to_string()))?;
        self.save_progress(&document.id, document.current_page).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Lang;
    use crate::document::Bookmark;
    use tempfile::TempDir;

    fn sample_document() -> Document {
        let text = "First page with enough text.\n\nSecond page with enough text.";
        Document::from_text("Sample", text, 30, Lang::new("en")).unwrap()
    }

    #[tokio::test]
    async fn test_document_roundtrip_with_progress() {
        let dir = TempDir::new().unwrap();
        let store = SledProgressStore::open(dir.path().join("db")).unwrap();

        let mut doc = sample_document();
        doc.bookmark = Some(Bookmark { page: 2, label: None });
        store.save_document(&doc).await.unwrap();
        store.save_progress(&doc.id, 2).await.unwrap();

        let loaded = store.load_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_page, 2);
        assert_eq!(loaded.pages, doc.pages);
        assert_eq!(loaded.bookmark, doc.bookmark);
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let dir = TempDir::new().unwrap();
        let store = SledProgressStore::open(dir.path().join("db")).unwrap();
        assert!(store.load_document("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        let doc = sample_document();

        {
            let store = SledProgressStore::open(&path).unwrap();
            store.save_document(&doc).await.unwrap();
            store.save_progress(&doc.id, 2).await.unwrap();
        }

        let store = SledProgressStore::open(&path).unwrap();
        let loaded = store.load_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_page, 2);
    }
}
