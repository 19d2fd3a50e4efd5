//! Progressive OCR: rasterize pages, recognize text, report as pages complete.

mod pipeline;
mod recognizer;

pub use pipeline::{OcrEvent, OcrPipeline, PageRasterizer};
pub use recognizer::{TextRecognizer, VisionRecognizer};

use serde::{Deserialize, Serialize};

/// Progress of the OCR run for the open document.
///
/// `not started -> in progress -> completed | failed`; `completed` only grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OcrState {
    pub in_progress: bool,
    pub completed: usize,
    pub total: usize,
    pub failed: bool,
}

impl OcrState {
    pub const fn started(total: usize) -> Self {
        Self {
            in_progress: true,
            completed: 0,
            total,
            failed: false,
        }
    }

    /// Record progress; stale (smaller) counts are ignored.
    pub fn advance(&mut self, done: usize, total: usize) {
        self.total = total;
        self.completed = self.completed.max(done.min(total));
    }

    pub const fn finish(&mut self) {
        self.in_progress = false;
        self.completed = self.total;
    }

    pub const fn fail(&mut self) {
        self.in_progress = false;
        self.failed = true;
    }

    pub const fn is_complete(&self) -> bool {
        !self.in_progress && !self.failed && self.completed == self.total
    }

    /// Percentage for progress indicators
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        u8::try_from(self.completed * 100 / self.total).unwrap_or(100)
    }
}
