use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Lang, TranslatorConfig};
use crate::error::{Error, Result};
use super::traits::{Granularity, Translator, TranslatorInfo};

/// OpenAI-compatible API translator
/// Works with: llama.cpp server, Ollama, DeepSeek, OpenAI, etc.
pub struct OpenAiTranslator {
    client: Client,
    /// Base URL for the API (e.g., "http://localhost:8080/v1")
    pub api_base: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Refuse to call out without a key
    pub require_api_key: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<M> {
    pub model: String,
    pub messages: Vec<M>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    pub content: String,
}

impl OpenAiTranslator {
    /// Create a translator from configuration.
    ///
    /// Falls back to a default client if the configured one cannot be built
    /// (e.g., TLS backend unavailable), so construction never fails.
    pub fn new(config: &TranslatorConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client ({}), using defaults", e);
                Client::new()
            });

        Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            require_api_key: config.require_api_key,
        }
    }

    /// Create translation prompt
    fn create_prompt(text: &str, source: &Lang, target: &Lang, granularity: Granularity) -> String {
        let source_hint = if source.is_auto() {
            String::new()
        } else {
            format!(" from {}", source.display_name())
        };
        let unit = match granularity {
            Granularity::Word => "word or phrase",
            Granularity::Paragraph => "paragraph",
            Granularity::Page => "page of text, keeping its paragraph breaks",
        };
        format!(
            "Translate the following {}{} into {}. Output only the translation, no explanations.\n\nText: \"{}\"",
            unit,
            source_hint,
            target.display_name(),
            text
        )
    }

    fn check_config(&self) -> Result<()> {
        if self.api_base.trim().is_empty() {
            return Err(Error::TranslationNotConfigured("api_base is empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(Error::TranslationNotConfigured("model is empty".to_string()));
        }
        if self.require_api_key && self.api_key.is_none() {
            return Err(Error::TranslationNotConfigured("API key missing".to_string()));
        }
        Ok(())
    }

    /// Make a single API request
    async fn request(
        &self,
        text: &str,
        source: &Lang,
        target: &Lang,
        granularity: Granularity,
    ) -> Result<String> {
        self.check_config()?;

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: Self::create_prompt(text, source, target, granularity),
            }],
            temperature: Some(0.3), // Lower temperature for more consistent translations
            max_tokens: Some(granularity.max_tokens()),
        };

        debug!("Translation request ({:?}) to {}", granularity, url);

        let mut req = self.client.post(&url).json(&request);

        // Add API key if configured
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await.map_err(|e| {
            warn!("Request failed: {}", e);
            if e.is_timeout() {
                Error::TranslationTimeout
            } else {
                Error::TranslationTransient(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            warn!("Rate limited, retry after {:?}s", retry_after);
            return Err(Error::TranslationRateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("API error: {} - {}", status, body);
            let message = format!("HTTP {status}: {body}");
            return Err(if status.is_server_error() {
                Error::TranslationTransient(message)
            } else {
                Error::TranslationBackend(message)
            });
        }

        let chat_response = response.json::<ChatResponse>().await.map_err(|e| {
            warn!("Failed to parse response: {}", e);
            Error::TranslationBackend(e.to_string())
        })?;

        let choice = chat_response
            .choices
            .first()
            .ok_or_else(|| Error::TranslationBackend("No choices in response".to_string()))?;

        Ok(strip_wrapping_quotes(&choice.message.content))
    }
}

/// Remove quotes if the model wrapped the response
pub(crate) fn strip_wrapping_quotes(content: &str) -> String {
    content
        .trim()
        .trim_start_matches('"')
        .trim_end_matches('"')
        .to_string()
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "OpenAI Compatible",
            requires_api_key: self.require_api_key,
        }
    }

    async fn translate(
        &self,
        text: &str,
        source: &Lang,
        target: &Lang,
        granularity: Granularity,
    ) -> Result<String> {
        // Skip empty text
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        // Skip if source and target are the same
        if source == target && !source.is_auto() {
            return Ok(text.to_string());
        }

        self.request(text, source, target, granularity).await
    }

    fn is_available(&self) -> bool {
        self.check_config().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;

    fn translator(config: TranslatorConfig) -> OpenAiTranslator {
        OpenAiTranslator::new(&config)
    }

    #[test]
    fn test_prompt_mentions_languages() {
        let prompt = OpenAiTranslator::create_prompt(
            "hola",
            &Lang::new("es"),
            &Lang::new("en"),
            Granularity::Word,
        );
        assert!(prompt.contains("from Spanish"));
        assert!(prompt.contains("into English"));
        assert!(prompt.contains("word or phrase"));
    }

    #[test]
    fn test_auto_source_omits_hint() {
        let prompt = OpenAiTranslator::create_prompt(
            "hola",
            &Lang::new("auto"),
            &Lang::new("en"),
            Granularity::Page,
        );
        assert!(!prompt.contains(" from "));
    }

    #[test]
    fn test_strip_wrapping_quotes() {
        assert_eq!(strip_wrapping_quotes("  \"Hello\"\n"), "Hello");
        assert_eq!(strip_wrapping_quotes("Plain"), "Plain");
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let mut config = TranslatorConfig::default();
        config.require_api_key = true;
        let t = translator(config);

        assert!(!t.is_available());
        let err = t
            .translate_page("Bonjour tout le monde", &Lang::new("fr"), &Lang::new("en"))
            .await
            .err();
        assert_eq!(err.and_then(|e| e.reason()), Some(FailureReason::ConfigMissing));
    }

    #[tokio::test]
    async fn test_same_language_is_passthrough() {
        let config = TranslatorConfig::new("", None, "");
        let t = translator(config);
        // Short-circuits before the config check
        let out = t
            .translate_word("hello", &Lang::new("en"), &Lang::new("en"))
            .await;
        assert_eq!(out.ok().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_empty_model_is_config_error() {
        let config = TranslatorConfig::new("http://localhost:1/v1", None, " ");
        let t = translator(config);
        let err = t
            .translate_paragraph("Hola a todos", &Lang::new("es"), &Lang::new("en"))
            .await
            .err();
        assert_eq!(err.and_then(|e| e.reason()), Some(FailureReason::ConfigMissing));
    }
}
