//! Page Reader Core Library
//!
//! A document reader that shows each page either in its own language or
//! machine-translated into the reader's language:
//! - Document ingestion (PDF via mupdf, plain text)
//! - Source-language detection
//! - Page translation coordination with one page of look-ahead
//! - Progressive background OCR for pages without extractable text
//! - Reading progress persistence (sled)

pub mod config;
pub mod content;
pub mod coordinator;
pub mod detect;
pub mod document;
pub mod error;
pub mod ocr;
pub mod pdf;
pub mod persist;
pub mod session;
pub mod store;
pub mod translator;
pub mod util;

pub use config::{
    AppConfig, Lang, LanguageOption, OcrConfig, StorageConfig, TranslatorConfig,
    display_languages, language_name, AUTO_LANG, DEFAULT_BASELINE_LANG, DEFAULT_DISPLAY_LANG,
};
pub use coordinator::{
    Coordinator, DisplayState, DisplayStatus, JobId, TranslationCacheEntry, TranslationJob, Trigger,
};
pub use detect::LanguageDetector;
pub use document::{Bookmark, Document, Page};
pub use error::{Error, FailureReason, Result};
pub use ocr::{OcrEvent, OcrPipeline, OcrState, PageRasterizer, TextRecognizer, VisionRecognizer};
pub use pdf::{PageRenderer, PdfDocument};
pub use persist::{ProgressStore, SledProgressStore};
pub use session::{ReadingSession, SessionEvent, SessionOptions};
pub use store::PageStore;
pub use translator::{Granularity, OpenAiTranslator, Translator, create_translator};

use std::sync::Arc;

/// Build session collaborators from configuration.
///
/// Persistence is skipped (with a warning) if the database cannot be opened;
/// reading works without it.
pub fn session_options(config: &AppConfig) -> SessionOptions {
    let progress: Option<Arc<dyn ProgressStore>> = if config.storage.enabled {
        let path = config
            .storage
            .path
            .clone()
            .unwrap_or_else(util::progress_db_path);
        match SledProgressStore::open(&path) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                tracing::warn!("Progress will not be saved: {}", e);
                None
            }
        }
    } else {
        None
    };

    SessionOptions {
        translator: create_translator(&config.translator),
        detector: LanguageDetector::new(config.baseline_lang.clone()),
        progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.source_lang.is_auto());
        assert_eq!(config.display_lang.as_str(), "en");
        assert!(config.asserted_source_lang().is_none());
    }

    #[test]
    fn test_options_without_storage() {
        let mut config = AppConfig::default();
        config.storage.enabled = false;
        let options = session_options(&config);
        assert!(options.progress.is_none());
        assert_eq!(options.detector.baseline().as_str(), "en");
    }
}
