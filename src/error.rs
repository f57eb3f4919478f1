//! Error types for the edgequake-pdf2html library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`Pdf2HtmlError`] — **Fatal**: the run cannot produce HTML at all
//!   (not a PDF, wrong password, model unreachable). Returned as
//!   `Err(Pdf2HtmlError)` from the top-level `convert*` functions. No HTML
//!   is ever presented after one of these.
//!
//! * [`ExtractionWarning`] — **Non-fatal**: a single page or image yielded
//!   nothing (unreadable text layer, unsupported image filter). The run
//!   continues with what was collected and the warning is carried in
//!   [`crate::output::ConversionOutput`].
//!
//! Every fatal error belongs to one [`ErrorKind`] so drivers (CLI, HTTP
//! server) can map it to an exit code or status without matching variants.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a fatal error, used by drivers to choose how to
/// surface it (HTTP status, exit code, message prefix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The uploaded/selected file is missing, unreadable or not a usable PDF.
    Input,
    /// The LLM call failed (auth, quota, network, malformed response).
    Generation,
    /// Writing the generated HTML failed.
    Output,
    /// Invalid configuration.
    Config,
    /// Anything else.
    Internal,
}

/// All fatal errors returned by the edgequake-pdf2html library.
#[derive(Debug, Error)]
pub enum Pdf2HtmlError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The upload contained no bytes at all.
    #[error("'{source_name}' is empty")]
    EmptyInput { source_name: String },

    /// The bytes were read, but they are not a PDF.
    #[error("'{source_name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{source_name}' could not be opened: {detail}")]
    CorruptPdf { source_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{source_name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{source_name}'")]
    WrongPassword { source_name: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Generation errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider rejected our credentials (401/403) — retry will not help.
    #[error("Authentication error from the LLM provider: {detail}")]
    AuthError { detail: String },

    /// The provider kept answering HTTP 429 until retries ran out.
    #[error("Rate limit exceeded after {attempts} attempts: {detail}")]
    RateLimitExceeded { attempts: u32, detail: String },

    /// Every attempt hit the per-call timeout.
    #[error("LLM call timed out after {secs}s ({attempts} attempts)")]
    ApiTimeout { secs: u64, attempts: u32 },

    /// The LLM API returned a non-retryable error, or retries ran out.
    #[error("LLM API error after {attempts} attempts: {message}")]
    LlmApiError { attempts: u32, message: String },

    /// The model answered, but with no content.
    #[error("The LLM returned an empty response")]
    EmptyResponse,

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output HTML file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2HtmlError {
    /// Which stage of the taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use Pdf2HtmlError::*;
        match self {
            FileNotFound { .. }
            | PermissionDenied { .. }
            | InvalidInput { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. }
            | EmptyInput { .. }
            | NotAPdf { .. }
            | CorruptPdf { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | PdfiumBindingFailed(_) => ErrorKind::Input,
            ProviderNotConfigured { .. }
            | AuthError { .. }
            | RateLimitExceeded { .. }
            | ApiTimeout { .. }
            | LlmApiError { .. }
            | EmptyResponse => ErrorKind::Generation,
            OutputWriteFailed { .. } => ErrorKind::Output,
            InvalidConfig(_) => ErrorKind::Config,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// A message suitable for showing to the person who uploaded the file.
    ///
    /// Input and generation failures get distinct, actionable prefixes so a
    /// broken PDF is never confused with a broken API key.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Input => format!("Could not read the uploaded PDF. {self}"),
            ErrorKind::Generation => format!(
                "HTML generation failed. {self}\nCheck the API key, quota and network, then try again."
            ),
            ErrorKind::Output => format!("Could not save the generated HTML. {self}"),
            ErrorKind::Config => self.to_string(),
            ErrorKind::Internal => format!("Unexpected failure. {self}"),
        }
    }
}

/// A non-fatal failure for a single page or image.
///
/// The unit is treated as "nothing found" and the run proceeds.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ExtractionWarning {
    /// The page's text layer could not be read.
    #[error("Page {page}: text extraction failed: {detail}")]
    PageText { page: usize, detail: String },

    /// Ruling lines could not be read from the page's content stream, so no
    /// table was looked for.
    #[error("Page {page}: table detection failed: {detail}")]
    PageTable { page: usize, detail: String },

    /// An embedded image was unreadable or in an unsupported encoding.
    #[error("Page {page}: image {index} skipped: {detail}")]
    ImageSkipped {
        page: usize,
        index: usize,
        detail: String,
    },
}
