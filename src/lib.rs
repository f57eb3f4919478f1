//! # edgequake-pdf2html
//!
//! Convert PDF datasheets into styled, semantic HTML pages with an LLM.
//!
//! ## Why this crate?
//!
//! A datasheet's text layer alone loses its tables and figures, and asking
//! a model to lay out a page it cannot see gives generic results. This crate
//! extracts everything the PDF holds explicitly (page text, one table per
//! page, every embedded image) and hands it to an LLM in a single prompt that
//! asks for an HTML page resembling the original.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file, URL or upload; check the %PDF header
//!  ├─ 2. Text      page text (pdfium) + default ruled table per page (lopdf rulings)
//!  ├─ 3. Images    embedded image XObjects → data-URI <img> tags (lopdf)
//!  ├─ 4. Prompt    fixed template: text, flattened tables, image tags
//!  ├─ 5. LLM       one chat call, timeout + bounded retry
//!  └─ 6. Present   sandboxed preview + converted_datasheet.html download
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2html::{convert, ConversionConfig, HtmlArtifact};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ConversionConfig::default();
//!     let output = convert("datasheet.pdf", &config).await?;
//!     eprintln!("{}", output.extraction_summary());
//!     HtmlArtifact::new(output.html).write_to(std::path::Path::new("converted_datasheet.html"))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `pdf2html` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server`  | on      | Upload / preview / download HTTP server (axum) |
//!
//! Disable defaults when using only the library:
//! ```toml
//! edgequake-pdf2html = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod present;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, DEFAULT_MODEL, DEFAULT_PROVIDER};
pub use convert::{
    convert, convert_bytes, convert_document, convert_sync, convert_to_file, extract_document,
    inspect, resolve_generator,
};
pub use error::{ErrorKind, ExtractionWarning, Pdf2HtmlError};
pub use output::{
    extraction_summary, ConversionOutput, ConversionStats, EncodedImage, ExtractedTable,
    ExtractionOutput, ImageExtraction, TextExtraction,
};
pub use pipeline::input::SourceDocument;
pub use pipeline::llm::{
    FailureKind, GenerationFailure, GenerationOptions, GenerationReply, HtmlGenerator,
    PromptMessage, PromptRole, ProviderGenerator,
};
pub use pipeline::table::TableSettings;
pub use present::{HtmlArtifact, DOWNLOAD_FILE_NAME, MEDIA_TYPE};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
