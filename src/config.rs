//! Configuration types for release-note analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. Callers set only what they care about and
//! rely on the documented defaults for the rest.

use crate::error::RelnotesError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default model for the cloud backend.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
/// Default model for the local backend.
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral";
/// Default address of a local Ollama server.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Configuration for one analysis run.
///
/// # Example
/// ```rust
/// use relnotes_analyzer::{AnalysisConfig, Backend};
///
/// let config = AnalysisConfig::builder()
///     .backend(Backend::Ollama)
///     .model("llama3.2")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Which engine analyses the notes. Default: [`Backend::Auto`].
    pub backend: Backend,

    /// LLM model identifier. If None, the backend's default model is used.
    pub model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `backend`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Prompt template family. If None, chosen from the backend:
    /// cloud models get [`PromptStyle::Sectioned`], local models
    /// [`PromptStyle::Flat`].
    pub prompt_style: Option<PromptStyle>,

    /// Custom system prompt. If None, uses the built-in prompt of the style.
    pub system_prompt: Option<String>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// The summary should restate the notes, not embellish them.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2000.
    pub max_tokens: usize,

    /// Retries after a failed LLM call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled on each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-LLM-call timeout in seconds. Default: 180.
    ///
    /// Local models on CPU can need minutes for a long changelog.
    pub api_timeout_secs: u64,

    /// Per-URL download timeout in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Maximum number of release-note URLs per request. Default: 3.
    pub max_urls: usize,

    /// Truncate the collected text to this many characters. Default: None.
    pub max_input_chars: Option<usize>,

    /// Password for encrypted release-note PDFs.
    pub pdf_password: Option<String>,

    /// Send image-only PDF pages to the model for transcription. Default: true.
    pub vision_fallback: bool,

    /// Longest edge of a rendered page image in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Base URL of the Ollama server used for model listing.
    pub ollama_host: String,

    /// Receives per-source and LLM events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model: None,
            provider: None,
            prompt_style: None,
            system_prompt: None,
            temperature: 0.0,
            max_tokens: 2000,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 180,
            download_timeout_secs: 30,
            max_urls: 3,
            max_input_chars: None,
            pdf_password: None,
            vision_fallback: true,
            max_rendered_pixels: 2000,
            ollama_host: std::env::var("OLLAMA_HOST")
                .ok()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("prompt_style", &self.prompt_style)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_urls", &self.max_urls)
            .field("max_input_chars", &self.max_input_chars)
            .field("vision_fallback", &self.vision_fallback)
            .field("ollama_host", &self.ollama_host)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt style in effect for this configuration.
    pub fn effective_style(&self) -> PromptStyle {
        self.prompt_style
            .unwrap_or_else(|| self.backend.default_style())
    }

    /// The model in effect for a named backend.
    pub fn effective_model(&self, backend: Backend) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| backend.default_model().to_string())
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn prompt_style(mut self, style: PromptStyle) -> Self {
        self.config.prompt_style = Some(style);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_urls(mut self, n: usize) -> Self {
        self.config.max_urls = n;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = Some(n);
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    pub fn vision_fallback(mut self, v: bool) -> Self {
        self.config.vision_fallback = v;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px;
        self
    }

    pub fn ollama_host(mut self, host: impl Into<String>) -> Self {
        self.config.ollama_host = host.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, RelnotesError> {
        let c = &self.config;
        if c.max_urls == 0 {
            return Err(RelnotesError::InvalidConfig(
                "max_urls must be ≥ 1".into(),
            ));
        }
        if c.max_rendered_pixels < 100 {
            return Err(RelnotesError::InvalidConfig(format!(
                "max_rendered_pixels must be ≥ 100, got {}",
                c.max_rendered_pixels
            )));
        }
        if c.max_input_chars == Some(0) {
            return Err(RelnotesError::InvalidConfig(
                "max_input_chars must be ≥ 1".into(),
            ));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(RelnotesError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Engine used to categorise the release notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Detect from the environment (OpenAI key, EDGEQUAKE_* variables, …).
    #[default]
    Auto,
    /// OpenAI chat completions (`OPENAI_API_KEY`).
    OpenAi,
    /// Local Ollama server (`OLLAMA_HOST`).
    Ollama,
    /// Offline keyword heuristics; no model involved.
    Keywords,
}

impl Backend {
    /// Provider name understood by `edgequake_llm::ProviderFactory`.
    pub fn provider_name(&self) -> Option<&'static str> {
        match self {
            Backend::OpenAi => Some("openai"),
            Backend::Ollama => Some("ollama"),
            Backend::Auto | Backend::Keywords => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Backend::Ollama => DEFAULT_OLLAMA_MODEL,
            _ => DEFAULT_OPENAI_MODEL,
        }
    }

    /// Local models follow the flat template more reliably than the nested one.
    pub fn default_style(&self) -> PromptStyle {
        match self {
            Backend::Ollama => PromptStyle::Flat,
            _ => PromptStyle::Sectioned,
        }
    }
}

impl FromStr for Backend {
    type Err = RelnotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "openai" => Ok(Backend::OpenAi),
            "ollama" | "local" => Ok(Backend::Ollama),
            "keywords" | "offline" => Ok(Backend::Keywords),
            other => Err(RelnotesError::InvalidConfig(format!(
                "unknown backend '{other}' (expected auto, openai, ollama or keywords)"
            ))),
        }
    }
}

/// Prompt template family; each has a matching response parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    /// `Admin Changes:` / `User Changes:` / `Compatibility Warnings:` with
    /// sub-headings and `•` bullets.
    Sectioned,
    /// `New Features:` / `Bugs Fixed:` / `Compatibility Issues and Breaking
    /// Changes:` / `Other Noteworthy Changes:` with `-` bullets.
    Flat,
}
