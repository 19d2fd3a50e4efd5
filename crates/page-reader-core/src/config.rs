use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Language codes following ISO 639-1 with regional variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `auto` code asks for detection instead of naming a language.
    pub fn is_auto(&self) -> bool {
        self.0 == AUTO_LANG
    }

    /// Human-readable name, for the "translating into ..." indicator.
    pub fn display_name(&self) -> &'static str {
        language_name(self.as_str())
    }
}

// Serde default functions for common languages
fn default_source_lang() -> Lang {
    Lang::new(AUTO_LANG)
}

fn default_display_lang() -> Lang {
    Lang::new(DEFAULT_DISPLAY_LANG)
}

fn default_baseline_lang() -> Lang {
    Lang::new(DEFAULT_BASELINE_LANG)
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Translator backend configuration for OpenAI-compatible APIs.
///
/// Supports llama.cpp, Ollama, DeepSeek, OpenAI, and any other OpenAI-compatible API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Reject calls up front when no key is set (hosted APIs)
    #[serde(default)]
    pub require_api_key: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TranslatorConfig {
    /// Create a new translator config
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            require_api_key: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

const fn default_timeout_secs() -> u64 {
    60
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080/v1".to_string(),
            api_key: None,
            model: "default_model".to_string(),
            require_api_key: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// OCR pipeline and recognizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Run OCR for documents with placeholder pages
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pages recognized concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batch size used when `low_memory` is set
    #[serde(default = "default_low_memory_batch_size")]
    pub low_memory_batch_size: usize,

    /// Constrained host (small devices, shared CI runners)
    #[serde(default)]
    pub low_memory: bool,

    /// Pause between batches so the host is not starved
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Rasterization scale factor for recognition
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,

    /// Vision model endpoint (OpenAI-compatible)
    #[serde(default = "default_ocr_api_base")]
    pub api_base: String,
    pub api_key: Option<String>,
    #[serde(default = "default_ocr_model")]
    pub model: String,
}

impl OcrConfig {
    /// Batch size to use given the host class. Never zero.
    pub fn effective_batch_size(&self) -> usize {
        let size = if self.low_memory {
            self.low_memory_batch_size
        } else {
            self.batch_size
        };
        size.max(1)
    }
}

const fn default_true() -> bool {
    true
}

const fn default_batch_size() -> usize {
    4
}

const fn default_low_memory_batch_size() -> usize {
    2
}

const fn default_batch_pause_ms() -> u64 {
    50
}

const fn default_render_scale() -> f32 {
    crate::pdf::DEFAULT_RENDER_SCALE
}

fn default_ocr_api_base() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_ocr_model() -> String {
    "llava".to_string()
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: default_batch_size(),
            low_memory_batch_size: default_low_memory_batch_size(),
            low_memory: false,
            batch_pause_ms: default_batch_pause_ms(),
            render_scale: default_render_scale(),
            api_base: default_ocr_api_base(),
            api_key: None,
            model: default_ocr_model(),
        }
    }
}

/// Reading progress persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Database directory (defaults to $XDG_DATA_HOME/page-reader)
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document language, or `auto` to detect it from page content
    #[serde(default = "default_source_lang")]
    pub source_lang: Lang,

    /// Language the reader wants to read in
    #[serde(default = "default_display_lang")]
    pub display_lang: Lang,

    /// Detector fallback when a sample is inconclusive
    #[serde(default = "default_baseline_lang")]
    pub baseline_lang: Lang,

    /// Translator backend configuration
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// OCR configuration
    #[serde(default)]
    pub ocr: OcrConfig,

    /// Progress persistence configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Target characters per page when paginating plain text
    #[serde(default = "default_chars_per_page")]
    pub chars_per_page: usize,
}

const fn default_chars_per_page() -> usize {
    2000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            display_lang: default_display_lang(),
            baseline_lang: default_baseline_lang(),
            translator: TranslatorConfig::default(),
            ocr: OcrConfig::default(),
            storage: StorageConfig::default(),
            chars_per_page: default_chars_per_page(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, crate::error::Error> {
        toml::from_str(content).map_err(|e| {
            crate::error::Error::ConfigLoad(format!("Failed to parse config: {e}"))
        })
    }

    /// Load from default locations (~/.config/page-reader/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("page-reader").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = std::path::PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        // Return defaults
        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Source language asserted by configuration, `None` when it must be detected.
    pub fn asserted_source_lang(&self) -> Option<Lang> {
        (!self.source_lang.is_auto()).then(|| self.source_lang.clone())
    }
}

/// A language option for pickers
#[derive(Debug, Clone)]
pub struct LanguageOption {
    /// ISO language code (e.g., "en", "fr", "zh-CN")
    pub code: &'static str,
    /// Display name (e.g., "English", "French")
    pub name: &'static str,
}

/// Languages the reader can display.
pub fn display_languages() -> Vec<LanguageOption> {
    ["en", "es", "fr", "de", "it", "pt", "zh-CN", "ja"]
        .into_iter()
        .map(|code| LanguageOption { code, name: language_name(code) })
        .collect()
}

/// Sentinel code meaning "detect the source language"
pub const AUTO_LANG: &str = "auto";
/// Default display language code
pub const DEFAULT_DISPLAY_LANG: &str = "en";
/// Default detector baseline code
pub const DEFAULT_BASELINE_LANG: &str = "en";

/// Convert language code to human-readable name
pub fn language_name(code: &str) -> &'static str {
    match code {
        "en" => "English",
        "zh-CN" => "Simplified Chinese",
        "zh-TW" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ar" => "Arabic",
        "auto" => "Auto",
        // For unknown languages, the LLM should still understand most ISO codes
        _ => "the specified language",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.source_lang.is_auto());
        assert_eq!(config.display_lang.as_str(), "en");
        assert_eq!(config.asserted_source_lang(), None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            source_lang = "es"

            [ocr]
            low_memory = true
            "#,
        )
        .unwrap();

        assert_eq!(config.asserted_source_lang(), Some(Lang::new("es")));
        assert_eq!(config.display_lang.as_str(), "en");
        assert_eq!(config.ocr.effective_batch_size(), 2);
        assert_eq!(config.ocr.batch_pause_ms, 50);
        assert!(config.storage.enabled);
    }

    #[test]
    fn test_batch_size_never_zero() {
        let ocr = OcrConfig { batch_size: 0, ..Default::default() };
        assert_eq!(ocr.effective_batch_size(), 1);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(AppConfig::from_toml("source_lang = [").is_err());
    }

    #[test]
    fn test_language_name() {
        assert_eq!(Lang::new("es").display_name(), "Spanish");
        assert_eq!(language_name("zh-CN"), "Simplified Chinese");
        assert_eq!(language_name("xx"), "the specified language");
    }
}
