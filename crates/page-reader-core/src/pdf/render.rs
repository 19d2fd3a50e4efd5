use image::{ExtendedColorType, ImageEncoder};
use mupdf::{Colorspace, Matrix};

use crate::error::{Error, Result};
use crate::ocr::PageRasterizer;
use super::document::PdfDocument;
use super::page_index::PageIndex;

/// Default scale factor for rendering (2.0 for high DPI)
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Rasterizes PDF pages to PNG for text recognition
#[derive(Debug, Clone)]
pub struct PageRenderer {
    /// The PDF document to render (cheap to clone)
    pub doc: PdfDocument,
    /// Scale factor for rendering
    pub scale: f32,
}

impl PageRenderer {
    /// Create a renderer with default scale (2.0)
    pub const fn new(doc: PdfDocument) -> Self {
        Self {
            doc,
            scale: DEFAULT_RENDER_SCALE,
        }
    }

    /// Create a renderer with custom scale
    pub const fn with_scale(doc: PdfDocument, scale: f32) -> Self {
        Self { doc, scale }
    }

    /// Render a page (1-based) to PNG bytes
    pub fn render_page_png(&self, page: usize) -> Result<Vec<u8>> {
        let page_index = PageIndex::from_page_number(page, self.doc.page_count())?;
        let render_err = |reason: String| Error::PdfRender { page, reason };

        let doc = self.doc.open_document()?;
        let mu_page = doc
            .load_page(page_index.into())
            .map_err(|e| render_err(format!("Failed to load page: {e}")))?;

        // Create transformation matrix for scaling
        let matrix = Matrix::new_scale(self.scale, self.scale);

        let pixmap = mu_page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 0.0, true)
            .map_err(|e| render_err(format!("Failed to render: {e}")))?;

        let color_type = match pixmap.n() {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            4 => ExtendedColorType::Rgba8,
            n => {
                return Err(render_err(format!("Unexpected pixel format with {n} components")));
            }
        };

        let mut png_data = Vec::new();
        // Use fast compression for better performance (still lossless)
        let encoder = image::codecs::png::PngEncoder::new_with_quality(
            &mut png_data,
            image::codecs::png::CompressionType::Fast,
            image::codecs::png::FilterType::Adaptive,
        );

        encoder
            .write_image(pixmap.samples(), pixmap.width(), pixmap.height(), color_type)
            .map_err(|e| render_err(format!("Failed to encode PNG: {e}")))?;

        Ok(png_data)
    }
}

impl PageRasterizer for PageRenderer {
    fn page_count(&self) -> usize {
        self.doc.page_count()
    }

    fn rasterize(&self, page: usize) -> Result<Vec<u8>> {
        self.render_page_png(page)
    }
}
