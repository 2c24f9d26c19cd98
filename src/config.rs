//! Configuration types for transaction extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`].

use crate::error::RunError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when only a provider name (or only `OPENAI_API_KEY`) is given.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_statement2tsv::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .concurrency(4)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Documents sent to the model at once. Default: 8.
    ///
    /// The work is network-bound; lower this if the provider answers `429`.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-mini", "gemini-2.0-flash".
    /// If None, uses [`DEFAULT_MODEL`] or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Extraction is transcription: amounts must be read, not imagined.
    pub temperature: f32,

    /// Output-size limit per document, in tokens. Default: 8192.
    ///
    /// A dense monthly statement can hold a few hundred rows; a limit that is
    /// too low truncates the JSON and the response is rejected as malformed.
    pub max_tokens: usize,

    /// Custom extraction rules replacing the built-in prompt. The response
    /// schema is always appended.
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-document model call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Longest edge, in pixels, of a rendered PDF page. Default: 2000.
    ///
    /// The other dimension scales proportionally, so memory stays bounded on
    /// oversized scans whatever their physical page size.
    pub max_rendered_pixels: u32,

    /// Receives per-document progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 8192,
            system_prompt: None,
            download_timeout_secs: 120,
            api_timeout_secs: 120,
            max_rendered_pixels: 2000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
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

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, RunError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(RunError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.max_tokens < 256 {
            return Err(RunError::InvalidConfig(format!(
                "max_tokens must be ≥ 256, got {}",
                c.max_tokens
            )));
        }
        if c.api_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(RunError::InvalidConfig("Timeouts must be ≥ 1 second".into()));
        }
        Ok(self.config)
    }
}
