//! Conversion entry points.
//!
//! One run is a straight line: resolve input → text and tables → images →
//! prompt → one generation call. Every stage finishes before the next
//! begins and nothing is retried except the generation call. The CLI and
//! the upload server are thin adapters over [`convert_document`].

use crate::config::{ConversionConfig, DEFAULT_MODEL, DEFAULT_PROVIDER};
use crate::error::Pdf2HtmlError;
use crate::output::{ConversionOutput, ConversionStats, ExtractionOutput};
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::llm::{self, HtmlGenerator, ProviderGenerator};
use crate::pipeline::{extract, images, prompt};
use crate::present::HtmlArtifact;
use crate::progress::Stage;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a PDF file or URL to HTML.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Every error is fatal and no HTML is returned:
/// - input errors (missing file, not a PDF, wrong password)
/// - generation errors (no provider, auth, quota, timeout, empty reply)
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2HtmlError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_document(&document, config).await
}

/// Convert PDF bytes held in memory, e.g. an HTTP upload.
///
/// `name` only labels messages. The bytes are checked for a PDF header
/// before anything else happens.
pub async fn convert_bytes(
    name: impl Into<String>,
    bytes: impl Into<Vec<u8>>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2HtmlError> {
    let document = SourceDocument::from_bytes(name, bytes)?;
    convert_document(&document, config).await
}

/// Run the full pipeline on an already-loaded document.
pub async fn convert_document(
    document: &SourceDocument,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2HtmlError> {
    let total_start = Instant::now();

    // ── Step 1-3: Extract and assemble prompt ────────────────────────────
    let extract_start = Instant::now();
    let extraction = extract_document(document, config).await?;
    let extraction_duration_ms = extract_start.elapsed().as_millis() as u64;

    // ── Step 4: Get/create generator ─────────────────────────────────────
    // Input errors are reported before a missing provider.
    let generator = resolve_generator(config)?;

    // ── Step 5: Generate HTML ────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Generation);
    }
    let generation = llm::generate_html(generator.as_ref(), &extraction.prompt, config).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_complete(Stage::Generation, generation.duration_ms);
    }

    let ExtractionOutput {
        text,
        images,
        prompt,
    } = extraction;

    let stats = ConversionStats {
        page_count: text.page_count,
        table_count: text.tables.len(),
        image_count: images.image_count,
        skipped_images: images.warnings.len(),
        prompt_chars: prompt.chars().count(),
        input_tokens: generation.input_tokens,
        output_tokens: generation.output_tokens,
        attempts: generation.attempts,
        extraction_duration_ms,
        generation_duration_ms: generation.duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {} bytes of HTML in {}ms ({} attempt(s))",
        generation.content.len(),
        stats.total_duration_ms,
        stats.attempts
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(generation.content.len());
    }

    Ok(ConversionOutput {
        html: generation.content,
        text,
        images,
        stats,
    })
}

/// Run both extractors and assemble the prompt, without calling a model.
///
/// Does not require an LLM provider or API key.
pub async fn extract_document(
    document: &SourceDocument,
    config: &ConversionConfig,
) -> Result<ExtractionOutput, Pdf2HtmlError> {
    let password = config.password.as_deref();
    let cb = config.progress_callback.as_ref();

    // ── Step 1: Text and tables ──────────────────────────────────────────
    let start = Instant::now();
    if let Some(cb) = cb {
        cb.on_stage_start(Stage::TextAndTables);
    }
    let text = extract::extract_text_and_tables(document, password, &config.table_settings).await?;
    if let Some(cb) = cb {
        cb.on_stage_complete(Stage::TextAndTables, start.elapsed().as_millis() as u64);
    }

    // ── Step 2: Images ───────────────────────────────────────────────────
    let start = Instant::now();
    if let Some(cb) = cb {
        cb.on_stage_start(Stage::Images);
    }
    let images = images::extract_images(document, password).await?;
    if let Some(cb) = cb {
        cb.on_stage_complete(Stage::Images, start.elapsed().as_millis() as u64);
        cb.on_extraction_complete(text.tables.len(), images.image_count);
    }
    for w in text.warnings.iter().chain(images.warnings.iter()) {
        debug!("Extraction warning: {}", w);
    }
    info!(
        "{}",
        crate::output::extraction_summary(text.tables.len(), images.image_count)
    );

    // ── Step 3: Prompt ───────────────────────────────────────────────────
    let start = Instant::now();
    if let Some(cb) = cb {
        cb.on_stage_start(Stage::Prompt);
    }
    let prompt = prompt::assemble_prompt(&text.full_text, &text.tables, &images.markup);
    if let Some(cb) = cb {
        cb.on_stage_complete(Stage::Prompt, start.elapsed().as_millis() as u64);
    }
    debug!("Prompt: {} chars", prompt.len());

    Ok(ExtractionOutput {
        text,
        images,
        prompt,
    })
}

/// Resolve a path or URL and run extraction only.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ExtractionOutput, Pdf2HtmlError> {
    let document = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    extract_document(&document, config).await
}

/// Convert a PDF and write the HTML to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2HtmlError> {
    let output = convert(input_str, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Pdf2HtmlError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }
    HtmlArtifact::new(output.html.as_str()).write_to(path)?;
    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2HtmlError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2HtmlError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Pick the generation backend: injected generator first, then a provider.
pub fn resolve_generator(config: &ConversionConfig) -> Result<Arc<dyn HtmlGenerator>, Pdf2HtmlError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }
    let (provider, label) = resolve_provider(config)?;
    Ok(Arc::new(ProviderGenerator::new(provider, label)))
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2HtmlError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2HtmlError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Gemini** when `GEMINI_API_KEY` or `GOOGLE_API_KEY` is set, with
///    [`DEFAULT_MODEL`] unless a model was given.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Returns the provider and a `provider/model` label for logs.
fn resolve_provider(config: &ConversionConfig) -> Result<(Arc<dyn LLMProvider>, String), Pdf2HtmlError> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), format!("custom/{}", model)));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        return Ok((create_provider(name, model)?, format!("{}/{}", name, model)));
    }

    // 3) Environment pair
    if let (Some(prov), Some(env_model)) = (
        env_non_empty("EDGEQUAKE_LLM_PROVIDER"),
        env_non_empty("EDGEQUAKE_MODEL"),
    ) {
        let model = config.model.clone().unwrap_or(env_model);
        return Ok((create_provider(&prov, &model)?, format!("{}/{}", prov, model)));
    }

    // 4) Gemini key present
    if env_non_empty("GEMINI_API_KEY").is_some() || env_non_empty("GOOGLE_API_KEY").is_some() {
        return Ok((
            create_provider(DEFAULT_PROVIDER, model)?,
            format!("{}/{}", DEFAULT_PROVIDER, model),
        ));
    }

    // 5) Whatever the environment offers
    warn!("No provider configured; auto-detecting from environment");
    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2HtmlError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY), or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok((llm_provider, "auto".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{GenerationFailure, GenerationOptions, GenerationReply, PromptMessage};
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: AtomicUsize,
    }

    impl HtmlGenerator for CountingGenerator {
        fn generate<'a>(
            &'a self,
            _messages: &'a [PromptMessage],
            _options: &'a GenerationOptions,
        ) -> BoxFuture<'a, Result<GenerationReply, GenerationFailure>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(GenerationReply {
                    content: "<html></html>".into(),
                    ..Default::default()
                })
            })
        }
    }

    #[test]
    fn injected_generator_wins() {
        let g = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
        });
        let config = ConversionConfig::builder()
            .generator(g.clone())
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        let resolved = resolve_generator(&config).unwrap();
        assert_eq!(resolved.name(), "custom");
    }

    #[tokio::test]
    async fn non_pdf_bytes_never_reach_the_generator() {
        let g = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
        });
        let config = ConversionConfig::builder().generator(g.clone()).build().unwrap();
        let err = convert_bytes("notes.pdf", b"plain text".to_vec(), &config)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Input);
        assert_eq!(g.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn convert_to_file_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert_to_file(
            "/no/such/file.pdf",
            dir.path().join("out.html"),
            &ConversionConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Pdf2HtmlError::FileNotFound { .. }));
        assert!(!dir.path().join("out.html").exists());
    }
}
