//! Input resolution: turn a path, URL or uploaded body into PDF bytes.
//!
//! Both extractors read the same bytes, so the document is loaded once into
//! an immutable, cheaply clonable buffer. There is no stream cursor to
//! rewind between the two passes. The `%PDF` header is checked here so a
//! renamed text file fails as an input error before any parser, prompt or
//! model is involved.

use crate::error::Pdf2HtmlError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// The PDF header must start within this many bytes of the file start.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Raw bytes of one uploaded PDF plus a label for messages.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    name: String,
    bytes: Arc<[u8]>,
}

impl SourceDocument {
    /// Wrap bytes after checking they look like a PDF.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Result<Self, Pdf2HtmlError> {
        let name = name.into();
        let bytes: Vec<u8> = bytes.into();
        validate_pdf_header(&name, &bytes)?;
        Ok(Self {
            name,
            bytes: Arc::from(bytes),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle for moving the bytes onto a blocking thread.
    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Reject empty input and anything without a `%PDF-` header near the start.
pub fn validate_pdf_header(name: &str, bytes: &[u8]) -> Result<(), Pdf2HtmlError> {
    if bytes.is_empty() {
        return Err(Pdf2HtmlError::EmptyInput {
            source_name: name.to_string(),
        });
    }
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window.windows(5).any(|w| w == b"%PDF-") {
        return Ok(());
    }
    Err(Pdf2HtmlError::NotAPdf {
        source_name: name.to_string(),
        magic: bytes.iter().take(4).copied().collect(),
    })
}

/// Resolve a local path or HTTP/HTTPS URL into a validated document.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceDocument, Pdf2HtmlError> {
    if input.trim().is_empty() {
        return Err(Pdf2HtmlError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<SourceDocument, Pdf2HtmlError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2HtmlError::PermissionDenied { path: path.clone() },
        _ => Pdf2HtmlError::FileNotFound { path: path.clone() },
    })?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    SourceDocument::from_bytes(path.display().to_string(), bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, Pdf2HtmlError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2HtmlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2HtmlError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2HtmlError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2HtmlError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2HtmlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    SourceDocument::from_bytes(url, bytes.to_vec())
}
