//! Decides what the reader sees for the current page and keeps one page of
//! translated look-ahead.
//!
//! The coordinator is a synchronous state machine. It never performs I/O:
//! [`Coordinator::evaluate`] and [`Coordinator::complete`] return the
//! translation jobs that should be started, and the session runs them and
//! feeds each result back by job id. Results are validated on arrival
//! against the current page, display language and page revision; anything
//! that no longer matches is dropped.

use tracing::{debug, info, warn};

use crate::config::Lang;
use crate::content::{Placeholder, is_real_content, placeholder_kind};
use crate::detect::{LanguageDetector, sample_for_detection};
use crate::error::Error;
use crate::store::PageStore;

/// What changed since the last evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A document was just opened
    Opened,
    /// The current page changed
    Navigated,
    /// The display language changed
    LanguageChanged,
    /// The source language was asserted or detected elsewhere
    SourceLanguageResolved,
    /// A page's text was replaced (OCR)
    PageContentChanged(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPurpose {
    /// Translation of the page on screen
    Current,
    /// Look-ahead translation of the next page
    Prefetch,
}

/// A page translation the session should start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationJob {
    pub id: JobId,
    pub purpose: JobPurpose,
    pub page: usize,
    pub text: String,
    pub source: Lang,
    pub target: Lang,
}

/// Bookkeeping for a job whose result has not arrived yet.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    id: JobId,
    page: usize,
    target: Lang,
    revision: u64,
}

impl Ticket {
    fn matches(&self, page: usize, target: &Lang, revision: u64) -> bool {
        self.page == page && &self.target == target && self.revision == revision
    }
}

/// The single pre-fetched translation slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationCacheEntry {
    pub for_page_number: usize,
    pub language: Lang,
    pub text: String,
    /// Page revision the translation was computed from
    revision: u64,
}

impl TranslationCacheEntry {
    fn matches(&self, page: usize, language: &Lang, revision: u64) -> bool {
        self.for_page_number == page && &self.language == language && self.revision == revision
    }
}

/// The page and language last shown to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Displayed {
    page: usize,
    language: Lang,
}

/// What kind of text is on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayStatus {
    /// Page text in its own language. `fallback` is set when a translation
    /// was attempted and failed.
    Original { fallback: bool },
    /// Translated page text
    Translated { language: Lang },
    /// A translation into `language` is in flight
    Translating { language: Lang },
    /// The page has no text yet; OCR is expected to provide it
    AwaitingOcr,
    /// OCR gave up on this page
    Unreadable,
}

/// Derived view of the current page, for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    pub page: usize,
    /// `None` while nothing displayable is available
    pub content: Option<String>,
    pub status: DisplayStatus,
}

impl DisplayState {
    const fn empty(page: usize) -> Self {
        Self {
            page,
            content: None,
            status: DisplayStatus::AwaitingOcr,
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self.status, DisplayStatus::Translating { .. })
    }
}

/// Coordinator state for one document session.
#[derive(Debug)]
pub struct Coordinator {
    detector: LanguageDetector,
    source_language: Option<Lang>,
    display_language: Lang,
    last_displayed: Option<Displayed>,
    display: DisplayState,
    prefetch: Option<TranslationCacheEntry>,
    current_job: Option<Ticket>,
    prefetch_job: Option<Ticket>,
    next_job_id: u64,
}

impl Coordinator {
    pub const fn new(
        detector: LanguageDetector,
        source_language: Option<Lang>,
        display_language: Lang,
    ) -> Self {
        Self {
            detector,
            source_language,
            display_language,
            last_displayed: None,
            display: DisplayState::empty(1),
            prefetch: None,
            current_job: None,
            prefetch_job: None,
            next_job_id: 0,
        }
    }

    pub const fn display(&self) -> &DisplayState {
        &self.display
    }

    pub const fn source_language(&self) -> Option<&Lang> {
        self.source_language.as_ref()
    }

    pub const fn display_language(&self) -> &Lang {
        &self.display_language
    }

    pub const fn prefetch(&self) -> Option<&TranslationCacheEntry> {
        self.prefetch.as_ref()
    }

    pub const fn is_translating_current(&self) -> bool {
        self.current_job.is_some()
    }

    pub const fn is_prefetching(&self) -> bool {
        self.prefetch_job.is_some()
    }

    /// Change the display language. Call [`Self::evaluate`] with
    /// [`Trigger::LanguageChanged`] afterwards.
    pub fn set_display_language(&mut self, language: Lang) {
        if language != self.display_language {
            info!("Display language {} -> {}", self.display_language, language);
            self.display_language = language;
        }
    }

    /// Assert the source language (e.g. from configuration or a user choice).
    pub fn set_source_language(&mut self, language: Option<Lang>) {
        if language != self.source_language {
            self.source_language = language;
            self.last_displayed = None;
        }
    }

    /// Re-run the decision procedure for `current_page`.
    ///
    /// Returns at most one job for the current page and, once the current page
    /// is settled, at most one prefetch job.
    pub fn evaluate(
        &mut self,
        store: &PageStore,
        current_page: usize,
        trigger: Trigger,
    ) -> Vec<TranslationJob> {
        debug!("Evaluate page {} ({:?})", current_page, trigger);

        if let Trigger::PageContentChanged(page) = trigger {
            if page == current_page {
                self.last_displayed = None;
            }
            if self.prefetch.as_ref().is_some_and(|p| p.for_page_number == page) {
                debug!("Page {} rewritten, dropping its prefetch", page);
                self.prefetch = None;
            }
        }

        self.invalidate_prefetch(current_page);
        self.supersede_stale_jobs(store, current_page);

        let mut jobs: Vec<TranslationJob> =
            self.decide_current(store, current_page).into_iter().collect();

        if self.current_job.is_none() {
            jobs.extend(self.plan_prefetch(store, current_page));
        }

        jobs
    }

    /// Apply the result of a job started earlier.
    ///
    /// Stale results (wrong page, language, or page revision by now, or a job
    /// that was superseded) are discarded. May return a prefetch job once the
    /// current page has settled.
    pub fn complete(
        &mut self,
        store: &PageStore,
        current_page: usize,
        id: JobId,
        result: Result<String, Error>,
    ) -> Vec<TranslationJob> {
        if self.current_job.as_ref().is_some_and(|t| t.id == id) {
            let Some(ticket) = self.current_job.take() else {
                return Vec::new();
            };

            if !ticket.matches(current_page, &self.display_language, store.revision(current_page)) {
                debug!("Discarding stale translation of page {}", ticket.page);
                return self.evaluate(store, current_page, Trigger::Navigated);
            }

            match result {
                Ok(text) => {
                    self.show(current_page, Some(text), DisplayStatus::Translated {
                        language: ticket.target.clone(),
                    });
                    self.last_displayed = Some(Displayed { page: current_page, language: ticket.target });
                }
                Err(e) => {
                    warn!("Translation of page {} failed ({:?}): {}", current_page, e.reason(), e);
                    let raw = store.text(current_page).map(str::to_string);
                    self.show(current_page, raw, DisplayStatus::Original { fallback: true });
                }
            }

            return self.plan_prefetch(store, current_page).into_iter().collect();
        }

        if self.prefetch_job.as_ref().is_some_and(|t| t.id == id) {
            let Some(ticket) = self.prefetch_job.take() else {
                return Vec::new();
            };

            let next = current_page + 1;
            if !ticket.matches(next, &self.display_language, store.revision(next)) {
                debug!("Discarding stale prefetch of page {}", ticket.page);
                return Vec::new();
            }

            match result {
                Ok(text) => {
                    debug!("Prefetched page {} into {}", ticket.page, ticket.target);
                    self.prefetch = Some(TranslationCacheEntry {
                        for_page_number: ticket.page,
                        language: ticket.target,
                        text,
                        revision: ticket.revision,
                    });
                }
                Err(e) => {
                    debug!("Prefetch of page {} failed: {}", ticket.page, e);
                    self.prefetch = None;
                }
            }
            return Vec::new();
        }

        debug!("Discarding superseded result {:?}", id);
        Vec::new()
    }

    /// Keep the slot only if it can still be consumed (current page) or is the
    /// look-ahead for the next page, in the display language.
    fn invalidate_prefetch(&mut self, current_page: usize) {
        let keep = self.prefetch.as_ref().is_some_and(|p| {
            p.language == self.display_language
                && (p.for_page_number == current_page || p.for_page_number == current_page + 1)
        });
        if !keep && let Some(dropped) = self.prefetch.take() {
            debug!("Invalidated prefetch for page {}", dropped.for_page_number);
        }
    }

    /// Forget in-flight jobs that no longer match what is wanted. Their
    /// results will be dropped on arrival.
    fn supersede_stale_jobs(&mut self, store: &PageStore, current_page: usize) {
        let revision = store.revision(current_page);
        if self
            .current_job
            .as_ref()
            .is_some_and(|t| !t.matches(current_page, &self.display_language, revision))
        {
            debug!("Superseding current-page job");
            self.current_job = None;
        }

        // Landed on the page being prefetched: its result becomes the current one
        if self.current_job.is_none()
            && self
                .prefetch_job
                .as_ref()
                .is_some_and(|t| t.matches(current_page, &self.display_language, revision))
        {
            debug!("Promoting in-flight prefetch of page {}", current_page);
            self.current_job = self.prefetch_job.take();
        }

        let next = current_page + 1;
        if self
            .prefetch_job
            .as_ref()
            .is_some_and(|t| !t.matches(next, &self.display_language, store.revision(next)))
        {
            debug!("Superseding prefetch job");
            self.prefetch_job = None;
        }
    }

    fn decide_current(&mut self, store: &PageStore, page: usize) -> Option<TranslationJob> {
        if let Some(ticket) = &self.current_job {
            // Still waiting on a valid translation of this page
            if self.display.page != page || !self.display.is_loading() {
                let language = ticket.target.clone();
                self.show(page, None, DisplayStatus::Translating { language });
            }
            return None;
        }

        let wanted = Displayed { page, language: self.display_language.clone() };
        if self.last_displayed.as_ref() == Some(&wanted) {
            return None;
        }

        let Some(text) = store.text(page) else {
            self.show(page, None, DisplayStatus::AwaitingOcr);
            return None;
        };

        match placeholder_kind(text) {
            Some(Placeholder::Pending) => {
                self.show(page, None, DisplayStatus::AwaitingOcr);
                return None;
            }
            Some(Placeholder::Failed) => {
                self.show(page, Some(text.to_string()), DisplayStatus::Unreadable);
                return None;
            }
            None => {}
        }

        if self.source_language.is_none()
            && let Some(sample) = sample_for_detection(text)
        {
            let detected = self.detector.detect(sample);
            info!("Detected source language {} on page {}", detected, page);
            self.source_language = Some(detected);
        }

        let source = match &self.source_language {
            Some(source) if is_real_content(text) && source != &self.display_language => {
                source.clone()
            }
            // Same language, or nothing worth translating
            _ => {
                self.show(page, Some(text.to_string()), DisplayStatus::Original { fallback: false });
                self.last_displayed = Some(wanted);
                return None;
            }
        };

        let revision = store.revision(page);
        if let Some(entry) = &self.prefetch
            && entry.matches(page, &self.display_language, revision)
        {
            debug!("Using prefetched translation for page {}", page);
            let content = Some(entry.text.clone());
            let language = entry.language.clone();
            self.show(page, content, DisplayStatus::Translated { language });
            self.last_displayed = Some(wanted);
            return None;
        }

        let job = self.new_job(JobPurpose::Current, page, text, source, revision);
        info!("Translating page {} ({} -> {})", page, job.source, job.target);
        self.show(page, None, DisplayStatus::Translating { language: job.target.clone() });
        Some(job)
    }

    fn plan_prefetch(&mut self, store: &PageStore, current_page: usize) -> Option<TranslationJob> {
        let next = current_page + 1;
        if next > store.total_pages() {
            return None;
        }

        let source = self.source_language.clone()?;
        if source == self.display_language {
            return None;
        }

        let revision = store.revision(next);
        if self
            .prefetch
            .as_ref()
            .is_some_and(|p| p.matches(next, &self.display_language, revision))
        {
            return None;
        }
        if self
            .prefetch_job
            .as_ref()
            .is_some_and(|t| t.matches(next, &self.display_language, revision))
        {
            return None;
        }

        let text = store.text(next)?;
        if !is_real_content(text) {
            debug!("Prefetch skipped for page {}: no real content yet", next);
            return None;
        }

        let job = self.new_job(JobPurpose::Prefetch, next, text, source, revision);
        debug!("Prefetching page {} into {}", next, job.target);
        Some(job)
    }

    fn new_job(
        &mut self,
        purpose: JobPurpose,
        page: usize,
        text: &str,
        source: Lang,
        revision: u64,
    ) -> TranslationJob {
        self.next_job_id += 1;
        let id = JobId(self.next_job_id);
        let target = self.display_language.clone();

        let ticket = Ticket { id, page, target: target.clone(), revision };
        match purpose {
            JobPurpose::Current => self.current_job = Some(ticket),
            JobPurpose::Prefetch => self.prefetch_job = Some(ticket),
        }

        TranslationJob {
            id,
            purpose,
            page,
            text: text.to_string(),
            source,
            target,
        }
    }

    /// Replace what is on screen. Callers that finish a page set
    /// `last_displayed` again afterwards.
    fn show(&mut self, page: usize, content: Option<String>, status: DisplayStatus) {
        self.last_displayed = None;
        self.display = DisplayState { page, content, status };
    }
}
