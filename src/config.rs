//! Configuration types for PDF-to-HTML conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The CLI and the upload server both map
//! their flags onto the builder, so a library caller gets exactly the same
//! knobs.

use crate::error::Pdf2HtmlError;
use crate::pipeline::llm::HtmlGenerator;
use crate::pipeline::table::TableSettings;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Provider paired with [`DEFAULT_MODEL`].
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Configuration for a PDF-to-HTML conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2html::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .model("gemini-2.5-flash")
///     .max_retries(2)
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// LLM model identifier, e.g. "gemini-2.5-flash", "gpt-4.1-mini".
    /// If None, uses [`DEFAULT_MODEL`] or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the
    /// environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Fully custom generation backend. Takes precedence over `provider`.
    ///
    /// Used by tests and by embedders that route generation through their
    /// own infrastructure.
    pub generator: Option<Arc<dyn HtmlGenerator>>,

    /// Sampling temperature for the completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// A styled single-page datasheet with inline CSS and embedded tables
    /// regularly exceeds 4 000 tokens.
    pub max_tokens: usize,

    /// Retries after the first attempt on a transient failure. Default: 3.
    ///
    /// Authentication and other permanent errors are never retried.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per retry. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-attempt timeout for the generation call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom system prompt. If None, uses the built-in converter role.
    pub system_prompt: Option<String>,

    /// Thresholds for the default table heuristic.
    pub table_settings: TableSettings,

    /// Height of the preview frame in pixels. Default: 600.
    pub preview_height: u32,

    /// Remove `<script>` and inline event handlers from the preview copy.
    /// The download is never modified. Default: false.
    pub strip_preview_scripts: bool,

    /// Optional progress callback for stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            temperature: 0.1,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            password: None,
            system_prompt: None,
            table_settings: TableSettings::default(),
            preview_height: 600,
            strip_preview_scripts: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn HtmlGenerator>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("table_settings", &self.table_settings)
            .field("preview_height", &self.preview_height)
            .field("strip_preview_scripts", &self.strip_preview_scripts)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Total generation attempts allowed (first try + retries).
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
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

    pub fn generator(mut self, generator: Arc<dyn HtmlGenerator>) -> Self {
        self.config.generator = Some(generator);
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

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn table_settings(mut self, settings: TableSettings) -> Self {
        self.config.table_settings = settings;
        self
    }

    pub fn preview_height(mut self, px: u32) -> Self {
        self.config.preview_height = px;
        self
    }

    pub fn strip_preview_scripts(mut self, v: bool) -> Self {
        self.config.strip_preview_scripts = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2HtmlError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Pdf2HtmlError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2HtmlError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.preview_height < 100 {
            return Err(Pdf2HtmlError::InvalidConfig(format!(
                "Preview height must be ≥ 100px, got {}",
                c.preview_height
            )));
        }
        if let Some(ref model) = c.model {
            if model.trim().is_empty() {
                return Err(Pdf2HtmlError::InvalidConfig(
                    "Model name must not be empty".into(),
                ));
            }
        }
        c.table_settings.validate()?;
        Ok(self.config)
    }
}
