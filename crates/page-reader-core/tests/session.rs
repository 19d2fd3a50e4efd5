//! Integration tests for page-reader-core
//!
//! These tests drive a full reading session against mock backends:
//! - Same-language documents never reach the translator
//! - Detection, translation and one page of look-ahead
//! - Late results from superseded requests are dropped
//! - Progressive OCR filling in scanned pages
//! - Progress persistence across sessions

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use page_reader_core::{
    DisplayStatus, Document, Error, Granularity, Lang, LanguageDetector, OcrConfig, OcrPipeline,
    PageRasterizer, ReadingSession, Result, SessionOptions, SledProgressStore, TextRecognizer,
    Translator, TranslatorConfig, content::is_real_content, create_translator,
    translator::TranslatorInfo,
};
use tempfile::TempDir;
use tokio::sync::Notify;

// =============================================================================
// Mock Backends
// =============================================================================

const EN_1: &str = "The first page is written in English and it has plenty of words.";
const EN_2: &str = "The second page of the book is also in English, of course.";
const ES_1: &str = "Él corrió rápidamente hacia la montaña con gran energía.";
const ES_2: &str = "La niña leyó el libro en la biblioteca de la ciudad.";
const ES_3: &str = "El señor compró pan y leche en la tienda de la esquina.";

/// Translator that tags text with the target language and records every call.
#[derive(Default)]
struct MockTranslator {
    calls: Mutex<Vec<String>>,
    /// Requests for this text wait until the gate is opened
    gated_text: Option<String>,
    gate: Arc<Notify>,
    should_fail: bool,
}

impl MockTranslator {
    fn new() -> Self {
        Self::default()
    }

    fn failing() -> Self {
        Self { should_fail: true, ..Self::default() }
    }

    fn gated(text: &str) -> Self {
        Self { gated_text: Some(text.to_string()), ..Self::default() }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo { name: "mock", requires_api_key: false }
    }

    async fn translate(
        &self,
        text: &str,
        _source: &Lang,
        target: &Lang,
        _granularity: Granularity,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }

        if self.gated_text.as_deref() == Some(text) {
            self.gate.notified().await;
        }

        if self.should_fail {
            return Err(Error::TranslationTransient("mock failure".to_string()));
        }
        Ok(format!("[{target}] {text}"))
    }
}

/// Rasterizer whose "image" is just the page number.
struct NumberedPages(usize);

impl PageRasterizer for NumberedPages {
    fn page_count(&self) -> usize {
        self.0
    }

    fn rasterize(&self, page: usize) -> Result<Vec<u8>> {
        Ok(page.to_string().into_bytes())
    }
}

/// Recognizer returning canned text per page; pages without an entry fail.
struct ScriptedRecognizer(HashMap<usize, &'static str>);

#[async_trait]
impl TextRecognizer for ScriptedRecognizer {
    async fn recognize(&self, image_png: &[u8], _language: Option<&Lang>) -> Result<String> {
        let page: usize = std::str::from_utf8(image_png)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        self.0
            .get(&page)
            .map(|t| (*t).to_string())
            .ok_or_else(|| Error::OcrRequest(format!("no script for page {page}")))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn document(texts: &[&str], display: &str) -> Document {
    Document::from_page_texts(
        "test-doc",
        "Test Document",
        texts.iter().map(|t| (*t).to_string()).collect(),
        Lang::new(display),
    )
    .unwrap()
}

fn options(translator: Arc<MockTranslator>) -> SessionOptions {
    SessionOptions {
        translator,
        detector: LanguageDetector::new(Lang::new("en")),
        progress: None,
    }
}

fn pipeline(script: &[(usize, &'static str)]) -> OcrPipeline {
    let recognizer = ScriptedRecognizer(script.iter().copied().collect());
    let config = OcrConfig { batch_size: 2, batch_pause_ms: 0, ..Default::default() };
    OcrPipeline::new(Arc::new(recognizer), &config)
}

// =============================================================================
// Translation Coordination
// =============================================================================

#[tokio::test]
async fn test_same_language_never_translates() {
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&[EN_1, EN_2], "en"), options(Arc::clone(&translator))).await;

    assert_eq!(session.current_display().text(), EN_1);
    assert!(!session.current_display().is_loading());

    session.go_to_page(2).unwrap();
    session.settle().await;
    assert_eq!(session.current_display().text(), EN_2);
    assert!(translator.calls().is_empty());
    assert_eq!(session.source_language().map(Lang::as_str), Some("en"));
}

#[tokio::test]
async fn test_translate_then_prefetch_then_consume() {
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&[ES_1, ES_2, ES_3], "en"), options(Arc::clone(&translator)))
            .await;

    assert!(session.current_display().is_loading());
    session.settle().await;

    assert_eq!(session.current_display().text(), format!("[en] {ES_1}"));
    assert_eq!(translator.calls(), vec![ES_1.to_string(), ES_2.to_string()]);

    // Page 2 comes straight from the prefetch slot
    session.go_to_page(2).unwrap();
    let display = session.current_display();
    assert!(!display.is_loading());
    assert_eq!(display.text(), format!("[en] {ES_2}"));

    session.settle().await;
    assert_eq!(
        translator.calls(),
        vec![ES_1.to_string(), ES_2.to_string(), ES_3.to_string()]
    );
}

#[tokio::test]
async fn test_repeated_evaluation_adds_no_calls() {
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&[ES_1, ES_2], "en"), options(Arc::clone(&translator))).await;
    session.settle().await;
    let before = translator.calls().len();

    session.set_display_language(Lang::new("en"));
    session.go_to_page(1).unwrap();
    session.settle().await;

    assert_eq!(translator.calls().len(), before);
    assert_eq!(session.current_display().text(), format!("[en] {ES_1}"));
}

#[tokio::test]
async fn test_late_result_for_previous_page_is_dropped() {
    let translator = Arc::new(MockTranslator::gated(ES_1));
    let mut session =
        ReadingSession::open(document(&[ES_1, ES_2, ES_3], "en"), options(Arc::clone(&translator)))
            .await;
    let mut display_rx = session.subscribe();

    session.go_to_page(3).unwrap();
    translator.gate.notify_one();
    session.settle().await;

    let display = session.current_display();
    assert_eq!(display.page, 3);
    assert_eq!(display.text(), format!("[en] {ES_3}"));
    assert!(display_rx.has_changed().unwrap());
    assert_eq!(display_rx.borrow_and_update().text(), format!("[en] {ES_3}"));
}

#[tokio::test]
async fn test_language_change_retranslates_current_page() {
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&[ES_1, ES_2], "en"), options(Arc::clone(&translator))).await;
    session.settle().await;

    session.set_display_language(Lang::new("fr"));
    assert!(session.current_display().is_loading());
    session.settle().await;

    assert_eq!(session.current_display().text(), format!("[fr] {ES_1}"));
    assert_eq!(
        session.current_display().status,
        DisplayStatus::Translated { language: Lang::new("fr") }
    );
}

#[tokio::test]
async fn test_jump_past_prefetched_page_never_shows_it() {
    let texts: Vec<String> = (1..=50).map(|n| format!("{ES_2} Capítulo {n}.")).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&refs, "en"), options(Arc::clone(&translator))).await;

    session.go_to_page(10).unwrap();
    session.settle().await;
    assert_eq!(session.current_display().text(), format!("[en] {}", texts[9]));
    assert_eq!(session.prefetch().map(|p| p.for_page_number), Some(11));
    let eleven = format!("[en] {}", texts[10]);

    session.go_to_page(20).unwrap();
    assert!(session.prefetch().is_none());
    assert_eq!(session.current_display().page, 20);
    assert!(session.current_display().is_loading());

    while session.is_busy() {
        let event = session.next_event().await.unwrap();
        session.handle_event(event);
        assert_ne!(session.current_display().text(), eleven);
        assert_ne!(session.prefetch().map(|p| p.for_page_number), Some(11));
    }

    assert_eq!(session.current_display().text(), format!("[en] {}", texts[19]));
    assert_eq!(session.prefetch().map(|p| p.for_page_number), Some(21));
    let calls = translator.calls();
    assert_eq!(calls.iter().filter(|c| **c == texts[10]).count(), 1);
}

#[tokio::test]
async fn test_back_while_next_page_translates() {
    let translator = Arc::new(MockTranslator::gated(ES_3));
    let mut session =
        ReadingSession::open(document(&[ES_1, ES_2, ES_3], "en"), options(Arc::clone(&translator)))
            .await;
    session.settle().await;

    session.go_to_page(3).unwrap();
    assert!(session.current_display().is_loading());
    session.go_to_page(1).unwrap();
    assert_eq!(session.current_display().page, 1);

    translator.gate.notify_one();
    session.settle().await;

    let display = session.current_display();
    assert_eq!(display.page, 1);
    assert!(!display.is_loading());
    assert_eq!(display.text(), format!("[en] {ES_1}"));
}

#[tokio::test]
async fn test_failed_translation_shows_original() {
    let translator = Arc::new(MockTranslator::failing());
    let mut session =
        ReadingSession::open(document(&[ES_1], "en"), options(Arc::clone(&translator))).await;
    session.settle().await;

    let display = session.current_display();
    assert_eq!(display.text(), ES_1);
    assert_eq!(display.status, DisplayStatus::Original { fallback: true });

    // Navigating back to the page retries it
    session.go_to_page(1).unwrap();
    session.settle().await;
    assert_eq!(translator.calls().len(), 2);
}

#[tokio::test]
async fn test_missing_credentials_fall_back_to_original() {
    let config = TranslatorConfig {
        model: String::new(),
        ..Default::default()
    };
    let options = SessionOptions {
        translator: create_translator(&config),
        detector: LanguageDetector::new(Lang::new("en")),
        progress: None,
    };
    let mut session = ReadingSession::open(document(&[ES_1], "en"), options).await;
    session.settle().await;

    assert_eq!(session.current_display().text(), ES_1);
    assert!(!session.current_display().is_loading());
}

#[tokio::test]
async fn test_invalid_page_keeps_position() {
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&[EN_1, EN_2], "en"), options(translator)).await;

    assert!(matches!(
        session.go_to_page(3),
        Err(Error::InvalidPage { page: 3, total: 2 })
    ));
    assert!(session.go_to_page(0).is_err());
    assert_eq!(session.current_page(), 1);
    assert!(!session.previous_page());
    assert!(session.next_page());
    assert!(!session.next_page());
}

#[tokio::test]
async fn test_word_lookup() {
    let translator = Arc::new(MockTranslator::new());
    let session =
        ReadingSession::open(document(&[ES_1], "en"), options(Arc::clone(&translator))).await;

    let word = session.translate_selection("montaña", Granularity::Word).await;
    assert_eq!(word.as_deref(), Some("[en] montaña"));

    let failing = ReadingSession::open(
        document(&[ES_1], "en"),
        options(Arc::new(MockTranslator::failing())),
    )
    .await;
    assert!(failing.translate_selection("montaña", Granularity::Word).await.is_none());
}

// =============================================================================
// OCR
// =============================================================================

#[tokio::test]
async fn test_ocr_fills_scanned_pages() {
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&["", "", ""], "en"), options(Arc::clone(&translator))).await;

    assert_eq!(session.current_display().status, DisplayStatus::AwaitingOcr);
    assert!(session.source_language().is_none());

    session.start_ocr(pipeline(&[(1, ES_1), (2, ES_2), (3, ES_3)]), Arc::new(NumberedPages(3)));
    session.run_until_idle().await;

    assert!(session.ocr_state().is_complete());
    assert_eq!(session.current_page(), 1);
    assert_eq!(session.page_text(2), Some(ES_2));
    assert_eq!(session.current_display().text(), format!("[en] {ES_1}"));
    assert_eq!(session.source_language().map(Lang::as_str), Some("es"));
    assert!(translator.calls().iter().all(|text| is_real_content(text)));
}

#[tokio::test]
async fn test_navigation_during_ocr_keeps_position() {
    const EN_4: &str = "Page four is the one the reader jumped to while scanning ran.";
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&[EN_1, "", "", "", ""], "en"), options(translator)).await;

    // Three batches of two; page 1 has no script and keeps its text
    session.start_ocr(
        pipeline(&[(2, EN_2), (3, EN_1), (4, EN_4), (5, EN_2)]),
        Arc::new(NumberedPages(5)),
    );
    session.go_to_page(4).unwrap();
    assert_eq!(session.current_display().page, 4);
    assert_eq!(session.current_display().status, DisplayStatus::AwaitingOcr);

    while session.is_busy() || session.ocr_state().in_progress {
        let event = session.next_event().await.unwrap();
        session.handle_event(event);
        assert_eq!(session.current_page(), 4);
        assert_eq!(session.current_display().page, 4);
    }

    assert!(session.ocr_state().is_complete());
    assert_eq!(session.skipped_pages(), 0);
    assert_eq!(session.page_text(1), Some(EN_1));
    assert_eq!(session.current_display().text(), EN_4);
}

#[tokio::test]
async fn test_ocr_failure_keeps_extracted_text() {
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&[EN_1, ""], "en"), options(translator)).await;

    // Page 1 has no script and fails; page 2 is recognized
    session.start_ocr(pipeline(&[(2, EN_2)]), Arc::new(NumberedPages(2)));
    session.run_until_idle().await;

    assert_eq!(session.page_text(1), Some(EN_1));
    assert_eq!(session.page_text(2), Some(EN_2));
}

#[tokio::test]
async fn test_blank_page_after_ocr_advances() {
    let translator = Arc::new(MockTranslator::new());
    let mut session =
        ReadingSession::open(document(&["", "", EN_1], "en"), options(translator)).await;

    session.start_ocr(pipeline(&[(1, ""), (2, "   ")]), Arc::new(NumberedPages(2)));
    session.run_until_idle().await;

    assert_eq!(session.current_page(), 3);
    assert_eq!(session.skipped_pages(), 2);
    assert_eq!(session.current_display().text(), EN_1);

    session.go_to_page(1).unwrap();
    assert_eq!(session.skipped_pages(), 0);
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_progress_and_bookmark_survive_sessions() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledProgressStore::open(dir.path().join("progress")).unwrap());
    let with_store = || SessionOptions {
        translator: Arc::new(MockTranslator::new()),
        detector: LanguageDetector::new(Lang::new("en")),
        progress: Some(store.clone()),
    };

    let mut session = ReadingSession::open(document(&[EN_1, EN_2], "en"), with_store()).await;
    session.go_to_page(2).unwrap();
    session.set_bookmark(Some("chapter two".to_string()));
    session.go_to_page(1).unwrap();
    session.close().await;

    let mut session = ReadingSession::open(document(&[EN_1, EN_2], "en"), with_store()).await;
    assert_eq!(session.current_page(), 1);
    assert_eq!(
        session.bookmark().and_then(|b| b.label.as_deref()),
        Some("chapter two")
    );

    assert!(session.go_to_bookmark().unwrap());
    assert_eq!(session.current_page(), 2);
    session.close().await;

    let session = ReadingSession::open(document(&[EN_1, EN_2], "en"), with_store()).await;
    assert_eq!(session.current_page(), 2);
}

#[tokio::test]
async fn test_recognized_pages_are_reused() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledProgressStore::open(dir.path().join("progress")).unwrap());
    let with_store = || SessionOptions {
        translator: Arc::new(MockTranslator::new()),
        detector: LanguageDetector::new(Lang::new("en")),
        progress: Some(store.clone()),
    };

    let mut session = ReadingSession::open(document(&[EN_1, ""], "en"), with_store()).await;
    session.start_ocr(pipeline(&[(1, EN_1), (2, EN_2)]), Arc::new(NumberedPages(2)));
    session.run_until_idle().await;
    session.close().await;

    let session = ReadingSession::open(document(&[EN_1, ""], "en"), with_store()).await;
    assert_eq!(session.page_text(2), Some(EN_2));
}
