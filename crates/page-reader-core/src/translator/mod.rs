mod traits;
mod openai;

pub use traits::{Granularity, Translator, TranslatorInfo};
pub use openai::OpenAiTranslator;
pub(crate) use openai::{ChatRequest, ChatResponse, strip_wrapping_quotes};

use crate::config::TranslatorConfig;
use std::sync::Arc;

/// Create a translator from configuration
pub fn create_translator(config: &TranslatorConfig) -> Arc<dyn Translator> {
    Arc::new(OpenAiTranslator::new(config))
}
