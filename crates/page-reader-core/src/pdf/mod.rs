mod document;
mod page_index;
mod text;
mod render;

pub use document::PdfDocument;
pub use page_index::PageIndex;
pub use text::TextExtractor;
pub use render::{PageRenderer, DEFAULT_RENDER_SCALE};
