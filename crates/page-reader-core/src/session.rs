//! Reading session: owns the open document, the navigation pointer and the
//! background work feeding them.
//!
//! Every state change funnels through `&mut self`, so OCR results, translation
//! results and navigation are applied one at a time. Background tasks never
//! touch session state; they report back as [`SessionEvent`]s which the owner
//! pulls with [`ReadingSession::next_event`] and applies with
//! [`ReadingSession::handle_event`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Lang;
use crate::content::is_placeholder;
use crate::coordinator::{
    Coordinator, DisplayState, JobId, TranslationCacheEntry, TranslationJob, Trigger,
};
use crate::detect::LanguageDetector;
use crate::document::{Bookmark, Document, Page};
use crate::error::{Error, Result};
use crate::ocr::{OcrEvent, OcrPipeline, OcrState, PageRasterizer};
use crate::persist::ProgressStore;
use crate::store::PageStore;
use crate::translator::{Granularity, Translator};

/// Something a background task finished.
#[derive(Debug)]
pub enum SessionEvent {
    TranslationFinished {
        job: JobId,
        page: usize,
        result: Result<String>,
    },
    Ocr(OcrEvent),
}

/// Collaborators for a session.
pub struct SessionOptions {
    pub translator: Arc<dyn Translator>,
    pub detector: LanguageDetector,
    /// `None` disables persistence
    pub progress: Option<Arc<dyn ProgressStore>>,
}

pub struct ReadingSession {
    document_id: String,
    title: String,
    store: PageStore,
    current_page: usize,
    bookmark: Option<Bookmark>,
    coordinator: Coordinator,
    translator: Arc<dyn Translator>,
    persister: Option<Persister>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    ocr_rx: Option<mpsc::UnboundedReceiver<OcrEvent>>,
    ocr_task: Option<JoinHandle<()>>,
    ocr_state: OcrState,
    skipped_pages: usize,
    display_tx: watch::Sender<DisplayState>,
    pending_translations: usize,
}

impl ReadingSession {
    /// Open a document. If a progress store is configured, a previously saved
    /// copy restores the reading position, bookmark and any OCR'd pages.
    pub async fn open(document: Document, options: SessionOptions) -> Self {
        let SessionOptions { translator, detector, progress } = options;

        let document = match &progress {
            Some(store) => restore(store.as_ref(), document).await,
            None => document,
        };

        let Document {
            id,
            title,
            pages,
            current_page,
            source_language,
            display_language,
            bookmark,
        } = document;

        let store = PageStore::new(pages);
        let current_page = current_page.clamp(1, store.total_pages().max(1));
        let coordinator = Coordinator::new(detector, source_language, display_language);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (display_tx, _) = watch::channel(coordinator.display().clone());

        info!(
            "Opened '{}' ({} pages) at page {} with {}",
            title,
            store.total_pages(),
            current_page,
            translator.name()
        );

        let mut session = Self {
            document_id: id,
            title,
            store,
            current_page,
            bookmark,
            coordinator,
            translator,
            persister: progress.map(Persister::spawn),
            events_tx,
            events_rx,
            ocr_rx: None,
            ocr_task: None,
            ocr_state: OcrState::default(),
            skipped_pages: 0,
            display_tx,
            pending_translations: 0,
        };

        session.persist_document();
        session.reevaluate(Trigger::Opened);
        session
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.store.total_pages()
    }

    pub const fn bookmark(&self) -> Option<&Bookmark> {
        self.bookmark.as_ref()
    }

    pub const fn ocr_state(&self) -> OcrState {
        self.ocr_state
    }

    /// Pages jumped over by auto-advance since the last explicit navigation
    pub const fn skipped_pages(&self) -> usize {
        self.skipped_pages
    }

    pub const fn source_language(&self) -> Option<&Lang> {
        self.coordinator.source_language()
    }

    pub const fn display_language(&self) -> &Lang {
        self.coordinator.display_language()
    }

    /// Raw text of a page (1-based), placeholders included
    pub fn page_text(&self, page: usize) -> Option<&str> {
        self.store.text(page)
    }

    /// What the reader should see right now
    pub fn current_display(&self) -> DisplayState {
        self.coordinator.display().clone()
    }

    /// Receive a notification whenever [`Self::current_display`] changes
    pub fn subscribe(&self) -> watch::Receiver<DisplayState> {
        self.display_tx.subscribe()
    }

    /// The look-ahead translation held for the next page, if any
    pub const fn prefetch(&self) -> Option<&TranslationCacheEntry> {
        self.coordinator.prefetch()
    }

    /// True while translations started by this session have not reported back
    pub const fn is_busy(&self) -> bool {
        self.pending_translations > 0
    }

    pub fn go_to_page(&mut self, page: usize) -> Result<()> {
        let total = self.store.total_pages();
        if page == 0 || page > total {
            return Err(Error::InvalidPage { page, total });
        }

        self.skipped_pages = 0;
        self.navigate(page);
        Ok(())
    }

    /// Returns `false` on the last page
    pub fn next_page(&mut self) -> bool {
        let next = self.current_page + 1;
        next <= self.store.total_pages() && self.go_to_page(next).is_ok()
    }

    /// Returns `false` on the first page
    pub fn previous_page(&mut self) -> bool {
        self.current_page > 1 && self.go_to_page(self.current_page - 1).is_ok()
    }

    pub fn set_display_language(&mut self, language: Lang) {
        self.coordinator.set_display_language(language);
        self.reevaluate(Trigger::LanguageChanged);
        self.persist_document();
    }

    /// Assert the document language, or pass `None` to detect it again
    pub fn set_source_language(&mut self, language: Option<Lang>) {
        self.coordinator.set_source_language(language);
        self.reevaluate(Trigger::SourceLanguageResolved);
    }

    pub fn set_bookmark(&mut self, label: Option<String>) {
        let bookmark = Bookmark { page: self.current_page, label };
        info!("Bookmarked page {}", bookmark.page);
        self.bookmark = Some(bookmark);
        self.persist_document();
    }

    /// Jump to the bookmark; `false` if there is none
    pub fn go_to_bookmark(&mut self) -> Result<bool> {
        let Some(page) = self.bookmark.as_ref().map(|b| b.page) else {
            return Ok(false);
        };
        self.go_to_page(page)?;
        Ok(true)
    }

    /// Translate a selection (word or paragraph) into the display language.
    ///
    /// Failures are logged and yield `None`.
    pub async fn translate_selection(&self, text: &str, granularity: Granularity) -> Option<String> {
        let source = self
            .coordinator
            .source_language()
            .cloned()
            .unwrap_or_else(|| Lang::new(crate::config::AUTO_LANG));
        let target = self.coordinator.display_language();

        match self.translator.translate(text, &source, target, granularity).await {
            Ok(translated) => Some(translated),
            Err(e) => {
                warn!("{:?} lookup failed ({:?}): {}", granularity, e.reason(), e);
                None
            }
        }
    }

    /// Start background OCR. Pages are applied as they are recognized.
    pub fn start_ocr(&mut self, pipeline: OcrPipeline, source: Arc<dyn PageRasterizer>) {
        if self.ocr_task.is_some() {
            warn!("OCR already running for '{}'", self.title);
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.ocr_state = OcrState::started(source.page_count());
        let pipeline = pipeline.with_language_hint(self.coordinator.source_language().cloned());
        self.ocr_task = Some(pipeline.spawn(source, tx));
        self.ocr_rx = Some(rx);
    }

    /// Wait for the next background event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            Some(event) = self.events_rx.recv() => Some(event),
            Some(event) = recv_ocr(&mut self.ocr_rx) => Some(SessionEvent::Ocr(event)),
            else => None,
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::TranslationFinished { job, page, result } => {
                self.pending_translations = self.pending_translations.saturating_sub(1);
                debug!("Translation job {:?} for page {} finished", job, page);
                let jobs = self.coordinator.complete(&self.store, self.current_page, job, result);
                self.dispatch(jobs);
                self.publish();
            }
            SessionEvent::Ocr(event) => self.handle_ocr(event),
        }
    }

    /// Process events until no translation is outstanding.
    pub async fn settle(&mut self) {
        while self.is_busy() {
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    /// Process events until OCR has finished and no translation is outstanding.
    pub async fn run_until_idle(&mut self) {
        while self.is_busy() || self.ocr_rx.is_some() {
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    /// Snapshot of the document as it would be persisted
    pub fn snapshot(&self) -> Document {
        Document {
            id: self.document_id.clone(),
            title: self.title.clone(),
            pages: self.store.pages().cloned().collect(),
            current_page: self.current_page,
            source_language: self.coordinator.source_language().cloned(),
            display_language: self.coordinator.display_language().clone(),
            bookmark: self.bookmark.clone(),
        }
    }

    /// End the session, saving the final position.
    pub async fn close(mut self) {
        if let Some(task) = self.ocr_task.take() {
            task.abort();
        }

        if let Some(persister) = self.persister.take() {
            persister.save_document(self.snapshot());
            persister.finish().await;
        }
        info!("Closed '{}' at page {}", self.title, self.current_page);
    }

    fn navigate(&mut self, page: usize) {
        debug!("Navigate {} -> {}", self.current_page, page);
        self.current_page = page;
        self.reevaluate(Trigger::Navigated);
        self.persist_progress();
    }

    fn reevaluate(&mut self, trigger: Trigger) {
        let jobs = self.coordinator.evaluate(&self.store, self.current_page, trigger);
        self.dispatch(jobs);
        self.publish();
    }

    fn dispatch(&mut self, jobs: Vec<TranslationJob>) {
        for job in jobs {
            let translator = Arc::clone(&self.translator);
            let events = self.events_tx.clone();
            self.pending_translations += 1;

            tokio::spawn(async move {
                let result = translator.translate_page(&job.text, &job.source, &job.target).await;
                let _ = events.send(SessionEvent::TranslationFinished {
                    job: job.id,
                    page: job.page,
                    result,
                });
            });
        }
    }

    fn publish(&self) {
        let display = self.coordinator.display();
        self.display_tx.send_if_modified(|shown| {
            if shown == display {
                false
            } else {
                shown.clone_from(display);
                true
            }
        });
    }

    fn handle_ocr(&mut self, event: OcrEvent) {
        match event {
            OcrEvent::PageReady { page, text } => self.apply_ocr_page(page, text),
            OcrEvent::Progress { done, total } => self.ocr_state.advance(done, total),
            OcrEvent::Finished { total } => {
                info!("OCR finished for '{}' ({} pages)", self.title, total);
                self.ocr_state.finish();
                self.ocr_stopped();
                self.skip_unreadable_page();
                self.persist_document();
            }
            OcrEvent::Failed(reason) => {
                warn!("OCR failed for '{}': {}", self.title, reason);
                self.ocr_state.fail();
                self.ocr_stopped();
            }
        }
    }

    fn apply_ocr_page(&mut self, page: usize, text: String) {
        if self.store.is_real_content(page) && !crate::content::is_real_content(&text) {
            debug!("Keeping existing text for page {}", page);
            return;
        }

        if let Err(e) = self.store.replace(page, text) {
            warn!("Dropping OCR result: {}", e);
            return;
        }

        let current = self.current_page;
        if page == current || page == current + 1 {
            self.reevaluate(Trigger::PageContentChanged(page));
        }
    }

    fn ocr_stopped(&mut self) {
        self.ocr_rx = None;
        self.ocr_task = None;
    }

    /// After OCR, move off a page that still has nothing to read.
    fn skip_unreadable_page(&mut self) {
        if self.store.is_real_content(self.current_page) {
            return;
        }

        match self.store.nearest_real_content(self.current_page) {
            Some(page) => {
                info!("Page {} has no readable text, moving to page {}", self.current_page, page);
                self.skipped_pages += self.current_page.abs_diff(page);
                self.navigate(page);
            }
            None => debug!("No page with readable text in '{}'", self.title),
        }
    }

    fn persist_progress(&self) {
        if let Some(persister) = &self.persister {
            persister.save_progress(&self.document_id, self.current_page);
        }
    }

    fn persist_document(&self) {
        if let Some(persister) = &self.persister {
            persister.save_document(self.snapshot());
        }
    }
}

enum PersistRequest {
    Progress { document_id: String, page: usize },
    Document(Box<Document>),
}

/// Background writer for the progress store. Requests are applied in the
/// order they were made; failures are logged and dropped.
struct Persister {
    tx: mpsc::UnboundedSender<PersistRequest>,
    task: JoinHandle<()>,
}

impl Persister {
    fn spawn(store: Arc<dyn ProgressStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let result = match &request {
                    PersistRequest::Progress { document_id, page } => {
                        store.save_progress(document_id, *page).await
                    }
                    PersistRequest::Document(document) => store.save_document(document).await,
                };
                if let Err(e) = result {
                    warn!("Failed to save reading progress: {}", e);
                }
            }
        });
        Self { tx, task }
    }

    fn save_progress(&self, document_id: &str, page: usize) {
        let _ = self.tx.send(PersistRequest::Progress {
            document_id: document_id.to_string(),
            page,
        });
    }

    fn save_document(&self, document: Document) {
        let _ = self.tx.send(PersistRequest::Document(Box::new(document)));
    }

    /// Wait for queued writes to land
    async fn finish(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            warn!("Progress writer stopped abnormally: {}", e);
        }
    }
}

impl Drop for ReadingSession {
    fn drop(&mut self) {
        if let Some(task) = self.ocr_task.take() {
            task.abort();
        }
    }
}

async fn recv_ocr(rx: &mut Option<mpsc::UnboundedReceiver<OcrEvent>>) -> Option<OcrEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Merge a stored copy into a freshly ingested document.
async fn restore(progress: &dyn ProgressStore, mut document: Document) -> Document {
    match progress.load_document(&document.id).await {
        Ok(Some(saved)) if saved.pages.len() == document.pages.len() => {
            let recovered = merge_pages(&mut document.pages, saved.pages);
            document.current_page = saved.current_page;
            document.bookmark = saved.bookmark;
            if document.source_language.is_none() {
                document.source_language = saved.source_language;
            }
            info!(
                "Restored '{}' at page {} ({} recognized pages reused)",
                document.title, document.current_page, recovered
            );
        }
        Ok(Some(saved)) => warn!(
            "Stored copy of '{}' has {} pages, expected {}; ignoring it",
            document.title,
            saved.pages.len(),
            document.pages.len()
        ),
        Ok(None) => debug!("No saved progress for '{}'", document.title),
        Err(e) => warn!("Failed to load saved progress for '{}': {}", document.title, e),
    }
    document
}

/// Take stored text for pages that are still waiting for OCR.
fn merge_pages(pages: &mut [Page], saved: Vec<Page>) -> usize {
    let mut recovered = 0;
    for (page, saved) in pages.iter_mut().zip(saved) {
        if is_placeholder(&page.raw_text) && saved.is_real_content() {
            *page = saved;
            recovered += 1;
        }
    }
    recovered
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::content::placeholder_pending;

    #[test]
    fn test_merge_only_fills_placeholders() {
        let mut pages = vec![
            Page::new(1, "Fresh text from extraction."),
            Page::new(2, placeholder_pending(2)),
            Page::new(3, placeholder_pending(3)),
        ];
        let saved = vec![
            Page::new(1, "Old text that should not win."),
            Page::new(2, "Recognized text from last time."),
            Page::new(3, placeholder_pending(3)),
        ];

        assert_eq!(merge_pages(&mut pages, saved), 1);
        assert_eq!(pages[0].raw_text, "Fresh text from extraction.");
        assert_eq!(pages[1].raw_text, "Recognized text from last time.");
        assert!(pages[2].is_placeholder());
    }
}
