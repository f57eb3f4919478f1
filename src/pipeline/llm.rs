//! LLM interaction: send the assembled prompt and read back the HTML.
//!
//! The model sits behind the [`HtmlGenerator`] trait. Production code uses
//! [`ProviderGenerator`], a thin adapter over an `edgequake_llm` provider;
//! tests and embedders plug in their own implementation. All prompt text
//! lives in [`crate::prompts`], so nothing here changes when the wording
//! does.
//!
//! ## Retry Strategy
//!
//! Each attempt runs under `api_timeout_secs`. Timeouts, 5xx responses,
//! network errors and rate limits are transient and retried with
//! exponential backoff (`retry_backoff_ms * 2^(retry-1)`): with 500 ms base
//! and 3 retries the wait sequence is 500 ms → 1 s → 2 s. Authentication
//! failures and other permanent errors abort immediately.

use crate::config::ConversionConfig;
use crate::error::Pdf2HtmlError;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
}

/// One chat message handed to a generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

/// Sampling options for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl From<&ConversionConfig> for GenerationOptions {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// What a generator returns for one successful call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// How a failed call should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad or missing credentials. Never retried.
    Auth,
    /// Quota or rate limit hit. Retried.
    RateLimited,
    /// Network, 5xx, overload. Retried.
    Transient,
    /// Anything else. Never retried.
    Permanent,
}

/// A failed generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl GenerationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build a failure from a provider error message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify_failure(&message),
            message,
        }
    }
}

impl GenerationFailure {
    /// Build a failure from a typed provider error.
    pub fn from_llm_error(error: &LlmError) -> Self {
        Self {
            kind: classify_llm_error(error),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A text-generation backend that turns chat messages into one completion.
pub trait HtmlGenerator: Send + Sync {
    /// Short label for logs, e.g. `gemini/gemini-2.5-flash`.
    fn name(&self) -> String {
        "custom".to_string()
    }

    fn generate<'a>(
        &'a self,
        messages: &'a [PromptMessage],
        options: &'a GenerationOptions,
    ) -> BoxFuture<'a, Result<GenerationReply, GenerationFailure>>;
}

/// [`HtmlGenerator`] backed by an `edgequake_llm` provider.
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderGenerator {
    /// `label` is only used in logs, e.g. `gemini/gemini-2.5-flash`.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

impl HtmlGenerator for ProviderGenerator {
    fn name(&self) -> String {
        self.label.clone()
    }

    fn generate<'a>(
        &'a self,
        messages: &'a [PromptMessage],
        options: &'a GenerationOptions,
    ) -> BoxFuture<'a, Result<GenerationReply, GenerationFailure>> {
        Box::pin(async move {
            let chat: Vec<ChatMessage> = messages
                .iter()
                .map(|m| match m.role {
                    PromptRole::System => ChatMessage::system(m.content.as_str()),
                    PromptRole::User => ChatMessage::user(m.content.as_str()),
                })
                .collect();
            let opts = CompletionOptions {
                temperature: Some(options.temperature),
                max_tokens: Some(options.max_tokens),
                ..Default::default()
            };

            let response = self
                .provider
                .chat(&chat, Some(&opts))
                .await
                .map_err(|e| GenerationFailure::from_llm_error(&e))?;

            Ok(GenerationReply {
                content: response.content,
                input_tokens: response.prompt_tokens as usize,
                output_tokens: response.completion_tokens as usize,
            })
        })
    }
}

/// Classify a typed provider error for the retry loop. Only the catch-all
/// variants carry a free-text vendor message worth reading.
pub fn classify_llm_error(error: &LlmError) -> FailureKind {
    match error {
        LlmError::AuthError(_) => FailureKind::Auth,
        LlmError::RateLimited(_) => FailureKind::RateLimited,
        LlmError::NetworkError(_) | LlmError::Timeout => FailureKind::Transient,
        LlmError::ApiError(msg) | LlmError::ProviderError(msg) | LlmError::Unknown(msg) => {
            classify_failure(msg)
        }
        LlmError::TokenLimitExceeded { .. }
        | LlmError::InvalidRequest(_)
        | LlmError::ModelNotFound(_)
        | LlmError::ConfigError(_)
        | LlmError::NotSupported(_)
        | LlmError::SerializationError(_) => FailureKind::Permanent,
    }
}

/// Classify a free-text provider error message for the retry loop.
///
/// Vendors word these differently, so this looks for status codes and the
/// usual phrases.
pub fn classify_failure(message: &str) -> FailureKind {
    let m = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| m.contains(n));

    if has(&["401", "403", "unauthorized", "forbidden", "api key", "api_key", "authentication", "permission denied"]) {
        FailureKind::Auth
    } else if has(&["429", "rate limit", "rate-limit", "ratelimit", "quota", "resource_exhausted", "too many requests"]) {
        FailureKind::RateLimited
    } else if has(&[
        "500", "502", "503", "504", "timeout", "timed out", "overloaded", "unavailable",
        "connection", "network", "temporarily",
    ]) {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

/// The model's answer plus accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}

/// The two messages sent for a prompt: converter role, then the prompt.
pub fn build_messages(prompt: &str, config: &ConversionConfig) -> Vec<PromptMessage> {
    let system = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);
    vec![PromptMessage::system(system), PromptMessage::user(prompt)]
}

/// Run one generation with timeout and bounded retry.
///
/// Empty or whitespace-only content is an error, never a blank page.
pub async fn generate_html(
    generator: &dyn HtmlGenerator,
    prompt: &str,
    config: &ConversionConfig,
) -> Result<Generation, Pdf2HtmlError> {
    let start = Instant::now();
    let messages = build_messages(prompt, config);
    let options = GenerationOptions::from(config);
    let max_attempts = config.max_attempts();
    let per_attempt = Duration::from_secs(config.api_timeout_secs);

    info!(
        "Generating HTML with {} ({} prompt chars)",
        generator.name(),
        prompt.len()
    );

    let mut last_failure: Option<GenerationFailure> = None;
    let mut last_timed_out = false;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            let retry = attempt - 1;
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(2u64.saturating_pow(retry - 1));
            warn!(
                "Generation retry {}/{} after {}ms",
                retry, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_generation_attempt(attempt, max_attempts);
        }

        match timeout(per_attempt, generator.generate(&messages, &options)).await {
            Err(_) => {
                warn!(
                    "Generation attempt {} timed out after {}s",
                    attempt, config.api_timeout_secs
                );
                last_timed_out = true;
                last_failure = None;
            }
            Ok(Ok(reply)) => {
                if reply.content.trim().is_empty() {
                    return Err(Pdf2HtmlError::EmptyResponse);
                }
                let duration_ms = start.elapsed().as_millis() as u64;
                debug!(
                    "{} input tokens, {} output tokens, {}ms",
                    reply.input_tokens, reply.output_tokens, duration_ms
                );
                return Ok(Generation {
                    content: reply.content,
                    input_tokens: reply.input_tokens,
                    output_tokens: reply.output_tokens,
                    attempts: attempt,
                    duration_ms,
                });
            }
            Ok(Err(failure)) => match failure.kind {
                FailureKind::Auth => {
                    return Err(Pdf2HtmlError::AuthError {
                        detail: failure.message,
                    })
                }
                FailureKind::Permanent => {
                    return Err(Pdf2HtmlError::LlmApiError {
                        attempts: attempt,
                        message: failure.message,
                    })
                }
                FailureKind::RateLimited | FailureKind::Transient => {
                    warn!("Generation attempt {} failed: {}", attempt, failure);
                    last_timed_out = false;
                    last_failure = Some(failure);
                }
            },
        }
    }

    Err(match last_failure {
        Some(f) if f.kind == FailureKind::RateLimited => Pdf2HtmlError::RateLimitExceeded {
            attempts: max_attempts,
            detail: f.message,
        },
        Some(f) => Pdf2HtmlError::LlmApiError {
            attempts: max_attempts,
            message: f.message,
        },
        None if last_timed_out => Pdf2HtmlError::ApiTimeout {
            secs: config.api_timeout_secs,
            attempts: max_attempts,
        },
        None => Pdf2HtmlError::Internal("generation loop made no attempts".into()),
    })
}
