//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to follow a
//! conversion as it moves through extraction, prompt assembly and
//! generation. The CLI renders these events as spinners; the HTTP server
//! ignores them.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2html::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Announce;
//!
//! impl ConversionProgressCallback for Announce {
//!     fn on_extraction_complete(&self, tables: usize, images: usize) {
//!         eprintln!("Extracted {tables} tables and {images} images!");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Announce))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The linear stages of one conversion, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Text and default-table extraction (pdfium).
    TextAndTables,
    /// Embedded image extraction (lopdf).
    Images,
    /// Prompt templating.
    Prompt,
    /// The LLM call, including retries.
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::TextAndTables => "Extracting text and tables",
            Stage::Images => "Extracting images",
            Stage::Prompt => "Assembling prompt",
            Stage::Generation => "Generating HTML with LLM",
        };
        f.write_str(label)
    }
}

/// Called by the conversion pipeline as it moves between stages.
///
/// Stages never overlap, so calls arrive strictly in order. All methods
/// have no-op defaults.
pub trait ConversionProgressCallback: Send + Sync {
    /// A stage is about to start.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// A stage finished successfully after `duration_ms`.
    fn on_stage_complete(&self, stage: Stage, duration_ms: u64) {
        let _ = (stage, duration_ms);
    }

    /// Both extractors are done.
    fn on_extraction_complete(&self, tables: usize, images: usize) {
        let _ = (tables, images);
    }

    /// A generation attempt is being made (1-indexed).
    fn on_generation_attempt(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// The run succeeded and produced `html_len` bytes of HTML.
    fn on_conversion_complete(&self, html_len: usize) {
        let _ = html_len;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
