//! Text recognition backends.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Lang, OcrConfig};
use crate::error::{Error, Result};
use crate::translator::{ChatRequest, ChatResponse, strip_wrapping_quotes};

/// Converts a rendered page image into text.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text in a PNG image. An image with no text yields `""`.
    async fn recognize(&self, image_png: &[u8], language: Option<&Lang>) -> Result<String>;
}

/// Vision-model OCR over an OpenAI-compatible chat endpoint (Ollama, llama.cpp, OpenAI).
pub struct VisionRecognizer {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct VisionMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Vision models need more time per page than text translation
const OCR_TIMEOUT_SECS: u64 = 120;
const OCR_MAX_TOKENS: u32 = 4096;

impl VisionRecognizer {
    pub fn new(config: &OcrConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(OCR_TIMEOUT_SECS))
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
        }
    }

    fn prompt(language: Option<&Lang>) -> String {
        let hint = language
            .filter(|l| !l.is_auto())
            .map(|l| format!(" The text is in {}.", l.display_name()))
            .unwrap_or_default();
        format!(
            "Transcribe all text on this page exactly as written, in reading order, \
             keeping paragraph breaks.{hint} Output only the text. If the page has no text, output nothing."
        )
    }
}

#[async_trait]
impl TextRecognizer for VisionRecognizer {
    async fn recognize(&self, image_png: &[u8], language: Option<&Lang>) -> Result<String> {
        if self.api_base.trim().is_empty() || self.model.trim().is_empty() {
            return Err(Error::OcrNotConfigured("api_base and model are required".to_string()));
        }

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_png);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![VisionMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: Self::prompt(language) },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: format!("data:image/png;base64,{encoded}") },
                    },
                ],
            }],
            temperature: Some(0.0),
            max_tokens: Some(OCR_MAX_TOKENS),
        };

        debug!("OCR request ({} bytes) to {}", image_png.len(), url);

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::OcrRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OcrRequest(format!("HTTP {status}: {body}")));
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| Error::OcrRequest(format!("invalid response: {e}")))?;

        Ok(chat_response
            .choices
            .first()
            .map(|c| strip_wrapping_quotes(&c.message.content))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_language_hint() {
        assert!(VisionRecognizer::prompt(Some(&Lang::new("es"))).contains("in Spanish"));
        assert!(!VisionRecognizer::prompt(Some(&Lang::new("auto"))).contains("The text is in"));
        assert!(!VisionRecognizer::prompt(None).contains("The text is in"));
    }

    #[test]
    fn test_image_part_serialization() {
        let part = ContentPart::ImageUrl {
            image_url: ImageUrl { url: "data:image/png;base64,AAAA".to_string() },
        };
        let json = serde_json::to_value(&part).unwrap_or_default();
        assert_eq!(json["type"], "image_url");
        assert_eq!(json["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[tokio::test]
    async fn test_unconfigured_backend() {
        let config = OcrConfig { model: String::new(), ..Default::default() };
        let err = VisionRecognizer::new(&config).recognize(b"png", None).await;
        assert!(matches!(err, Err(Error::OcrNotConfigured(_))));
    }
}
