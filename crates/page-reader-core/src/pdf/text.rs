use mupdf::TextPageOptions;

use crate::error::{Error, Result};
use super::document::PdfDocument;
use super::page_index::PageIndex;

/// Plain-text extraction from PDF pages
pub struct TextExtractor<'a> {
    /// The PDF document to extract text from
    pub doc: &'a PdfDocument,
}

impl<'a> TextExtractor<'a> {
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self { doc }
    }

    /// Extract the text of a page (1-based), one paragraph per mupdf block.
    ///
    /// Lines inside a block are joined with spaces, and a trailing hyphen at a
    /// line break is removed so split words come back whole. Blocks are
    /// separated by a blank line.
    pub fn page_text(&self, page: usize) -> Result<String> {
        let page_index = PageIndex::from_page_number(page, self.doc.page_count())?;

        let doc = self.doc.open_document()?;
        let mu_page = doc.load_page(page_index.into()).map_err(|e| {
            Error::PdfTextExtraction {
                page,
                reason: format!("Failed to load page: {e}"),
            }
        })?;

        let text_page = mu_page.to_text_page(TextPageOptions::empty()).map_err(|e| {
            Error::PdfTextExtraction {
                page,
                reason: format!("Failed to get text page: {e}"),
            }
        })?;

        let mut paragraphs = Vec::new();

        for block in text_page.blocks() {
            let mut block_text = String::new();

            for line in block.lines() {
                let line_text: String = line.chars().filter_map(|c| c.char()).collect();
                let line_trimmed = line_text.trim();
                if line_trimmed.is_empty() {
                    continue;
                }

                // Join lines: handle hyphenation at line breaks
                if block_text.ends_with('-') {
                    block_text.pop();
                } else if !block_text.is_empty() {
                    block_text.push(' ');
                }
                block_text.push_str(line_trimmed);
            }

            let text = block_text.trim();
            if !text.is_empty() {
                paragraphs.push(text.to_string());
            }
        }

        Ok(paragraphs.join("\n\n"))
    }
}
