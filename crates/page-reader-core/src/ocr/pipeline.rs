use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Lang, OcrConfig};
use crate::content::placeholder_failed;
use crate::error::{Error, Result};
use super::recognizer::TextRecognizer;

/// Source of page images. Implementations may be slow and blocking; the
/// pipeline calls `rasterize` on the blocking thread pool.
pub trait PageRasterizer: Send + Sync + 'static {
    /// Total number of pages, known before any work starts
    fn page_count(&self) -> usize;

    /// Render a page (1-based) to PNG bytes
    fn rasterize(&self, page: usize) -> Result<Vec<u8>>;
}

/// What the pipeline reports while it runs, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrEvent {
    /// Text (or a failure placeholder) for one page
    PageReady { page: usize, text: String },
    /// Running count of finished pages
    Progress { done: usize, total: usize },
    /// Every page has been reported
    Finished { total: usize },
    /// The run could not start or aborted as a whole
    Failed(String),
}

/// Progressive, batched OCR over a whole document.
///
/// Pages within a batch are recognized concurrently and reported as each one
/// finishes; batches run one after another with a short pause in between.
#[derive(Clone)]
pub struct OcrPipeline {
    recognizer: Arc<dyn TextRecognizer>,
    batch_size: usize,
    batch_pause: Duration,
    language_hint: Option<Lang>,
}

impl OcrPipeline {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: &OcrConfig) -> Self {
        Self {
            recognizer,
            batch_size: config.effective_batch_size(),
            batch_pause: Duration::from_millis(config.batch_pause_ms),
            language_hint: None,
        }
    }

    /// Pass a language hint to the recognizer
    #[must_use]
    pub fn with_language_hint(mut self, lang: Option<Lang>) -> Self {
        self.language_hint = lang;
        self
    }

    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Recognize every page of `source`.
    ///
    /// `on_page_ready` fires exactly once per page, possibly out of page order
    /// within a batch. `on_progress` follows each page with a non-decreasing
    /// `done` count that reaches `total` once. A page that fails to rasterize
    /// or recognize is reported with a failure placeholder; only an empty
    /// document fails the run.
    pub async fn run<R, P>(
        &self,
        source: Arc<dyn PageRasterizer>,
        mut on_page_ready: R,
        mut on_progress: P,
    ) -> Result<()>
    where
        R: FnMut(usize, String),
        P: FnMut(usize, usize),
    {
        let total = source.page_count();
        if total == 0 {
            return Err(Error::DocumentEmpty);
        }

        info!("OCR starting: {} pages, batches of {}", total, self.batch_size);

        let pages: Vec<usize> = (1..=total).collect();
        let mut done = 0;

        for (batch_num, batch) in pages.chunks(self.batch_size).enumerate() {
            if batch_num > 0 && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }

            debug!("OCR batch {} ({} pages)", batch_num + 1, batch.len());

            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .map(|&page| self.process_page(Arc::clone(&source), page))
                .collect();

            while let Some((page, text)) = in_flight.next().await {
                on_page_ready(page, text);
                done += 1;
                on_progress(done, total);
            }
        }

        info!("OCR finished: {} pages", total);
        Ok(())
    }

    /// Run the pipeline on a background task, forwarding events to `events`.
    ///
    /// Send errors are ignored: a dropped receiver means nobody is reading
    /// the document anymore.
    pub fn spawn(
        self,
        source: Arc<dyn PageRasterizer>,
        events: mpsc::UnboundedSender<OcrEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let total = source.page_count();
            let result = self
                .run(
                    source,
                    |page, text| {
                        let _ = events.send(OcrEvent::PageReady { page, text });
                    },
                    |done, total| {
                        let _ = events.send(OcrEvent::Progress { done, total });
                    },
                )
                .await;

            let last = match result {
                Ok(()) => OcrEvent::Finished { total },
                Err(e) => {
                    warn!("OCR run failed: {}", e);
                    OcrEvent::Failed(e.to_string())
                }
            };
            let _ = events.send(last);
        })
    }

    async fn process_page(&self, source: Arc<dyn PageRasterizer>, page: usize) -> (usize, String) {
        match self.recognize_page(source, page).await {
            Ok(text) => (page, text),
            Err(e) => {
                warn!("OCR failed for page {}: {}", page, e);
                (page, placeholder_failed(page, &e.to_string()))
            }
        }
    }

    async fn recognize_page(&self, source: Arc<dyn PageRasterizer>, page: usize) -> Result<String> {
        let png = tokio::task::spawn_blocking(move || source.rasterize(page))
            .await
            .map_err(|e| Error::OcrPage {
                page,
                reason: format!("rasterizer task failed: {e}"),
            })??;

        let text = self
            .recognizer
            .recognize(&png, self.language_hint.as_ref())
            .await?;

        Ok(text.trim().to_string())
    }
}
