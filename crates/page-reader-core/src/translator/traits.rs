use async_trait::async_trait;
use crate::config::Lang;
use crate::error::Result;

/// Information about a translator backend
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Whether this translator requires an API key
    pub requires_api_key: bool,
}

/// Size class of a translation request.
///
/// Backends use it to pick a token budget; semantics are otherwise identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// A single word or short phrase (tooltips)
    Word,
    /// One paragraph or selection
    Paragraph,
    /// A full page of text
    Page,
}

impl Granularity {
    /// Upper bound on generated tokens for this size class
    pub const fn max_tokens(self) -> u32 {
        match self {
            Self::Word => 64,
            Self::Paragraph => 1024,
            Self::Page => 4096,
        }
    }
}

/// Trait for translation backends.
///
/// Implementations make exactly one attempt per call. Retrying is the
/// caller's business.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Get information about this translator
    fn info(&self) -> TranslatorInfo;

    /// Get the translator name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Translate text from source language to target language
    async fn translate(
        &self,
        text: &str,
        source: &Lang,
        target: &Lang,
        granularity: Granularity,
    ) -> Result<String>;

    async fn translate_word(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        self.translate(text, source, target, Granularity::Word).await
    }

    async fn translate_paragraph(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        self.translate(text, source, target, Granularity::Paragraph).await
    }

    async fn translate_page(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        self.translate(text, source, target, Granularity::Page).await
    }

    /// Check if the translator is available (e.g., API key configured)
    fn is_available(&self) -> bool {
        true
    }
}
