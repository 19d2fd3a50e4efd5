//! Reader-side document model and ingestion from PDF or plain text.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Lang;
use crate::content::{is_placeholder, is_real_content, placeholder_pending};
use crate::error::{Error, Result};
use crate::pdf::{PdfDocument, TextExtractor};

/// One page of document text, numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: usize,
    pub raw_text: String,
}

impl Page {
    pub fn new(number: usize, raw_text: impl Into<String>) -> Self {
        Self { number, raw_text: raw_text.into() }
    }

    pub fn is_real_content(&self) -> bool {
        is_real_content(&self.raw_text)
    }

    pub fn is_placeholder(&self) -> bool {
        is_placeholder(&self.raw_text)
    }
}

/// A saved reading position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub page: usize,
    pub label: Option<String>,
}

/// An open (or stored) document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub pages: Vec<Page>,
    /// 1-based reading position
    pub current_page: usize,
    /// `None` until asserted or detected
    pub source_language: Option<Lang>,
    pub display_language: Lang,
    #[serde(default)]
    pub bookmark: Option<Bookmark>,
}

impl Document {
    /// Build a document from page texts. Pages without real content are
    /// replaced by the pending placeholder so OCR can fill them in later.
    pub fn from_page_texts(
        id: impl Into<String>,
        title: impl Into<String>,
        texts: Vec<String>,
        display_language: Lang,
    ) -> Result<Self> {
        if texts.is_empty() {
            return Err(Error::DocumentEmpty);
        }

        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let number = i + 1;
                if is_real_content(&text) {
                    Page::new(number, text)
                } else {
                    Page::new(number, placeholder_pending(number))
                }
            })
            .collect();

        Ok(Self {
            id: id.into(),
            title: title.into(),
            pages,
            current_page: 1,
            source_language: None,
            display_language,
            bookmark: None,
        })
    }

    /// Ingest a PDF: one page per PDF page, text via mupdf.
    ///
    /// A page whose extraction fails is treated like a scanned page and gets
    /// the pending placeholder.
    pub fn from_pdf(pdf: &PdfDocument, fallback_title: &str, display_language: Lang) -> Result<Self> {
        let extractor = TextExtractor::new(pdf);
        let texts = (1..=pdf.page_count())
            .map(|page| {
                extractor.page_text(page).unwrap_or_else(|e| {
                    warn!("Text extraction failed for page {}: {}", page, e);
                    String::new()
                })
            })
            .collect();

        let title = pdf.title().unwrap_or(fallback_title);
        let doc = Self::from_page_texts(pdf.content_id(), title, texts, display_language)?;

        info!(
            "Ingested PDF '{}': {} pages, {} need OCR",
            doc.title,
            doc.total_pages(),
            doc.pages.iter().filter(|p| p.is_placeholder()).count()
        );
        Ok(doc)
    }

    /// Ingest plain text, paginated at paragraph boundaries.
    pub fn from_text(
        title: &str,
        text: &str,
        chars_per_page: usize,
        display_language: Lang,
    ) -> Result<Self> {
        let id = format!("{:x}", md5::compute(text.as_bytes()));
        let texts = paginate_text(text, chars_per_page);
        debug!("Paginated '{}' into {} pages", title, texts.len());
        Self::from_page_texts(id, title, texts, display_language)
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// True if any page still waits for OCR
    pub fn needs_ocr(&self) -> bool {
        self.pages.iter().any(Page::is_placeholder)
    }

    pub fn page(&self, number: usize) -> Option<&Page> {
        number.checked_sub(1).and_then(|i| self.pages.get(i))
    }
}

/// Split text into pages of roughly `chars_per_page` characters.
///
/// Paragraphs (blank-line separated) are kept whole unless a single paragraph
/// is longer than a page, in which case it is split at whitespace.
pub fn paginate_text(text: &str, chars_per_page: usize) -> Vec<String> {
    let limit = chars_per_page.max(1);
    let mut pages = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String| {
        if !current.trim().is_empty() {
            pages.push(std::mem::take(current));
        }
        current.clear();
    };

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let para_len = paragraph.chars().count();
        let current_len = current.chars().count();

        if current_len > 0 && current_len + 2 + para_len > limit {
            flush(&mut current);
        }

        if para_len <= limit {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
            continue;
        }

        // Oversized paragraph: fill pages word by word
        for word in paragraph.split_whitespace() {
            let len = current.chars().count();
            if len > 0 && len + 1 + word.chars().count() > limit {
                flush(&mut current);
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
    }
    flush(&mut current);

    pages
}
