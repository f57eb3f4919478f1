//! Text and default-table extraction via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is not safe to call
//! from async contexts. The whole pass runs on the blocking pool so Tokio
//! worker threads stay free for the HTTP server and the LLM call.
//!
//! Per page we take the plain text (appended with no separator), the glyph
//! boxes, and the ruling lines [`crate::pipeline::ruling`] reads from the
//! content stream; [`crate::pipeline::table`] turns those into at most one
//! table. A page that cannot be read contributes nothing and a warning; only
//! a document that cannot be opened at all is fatal.
//!
//! `Pdfium` is neither `Send` nor `Sync`, so each extraction binds its own
//! instance on the blocking thread that uses it.

use crate::error::{ExtractionWarning, Pdf2HtmlError};
use crate::output::{ExtractedTable, TextExtraction};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::ruling;
use crate::pipeline::table::{self, Glyph, TableSettings};
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

/// Extract concatenated page text and one default table per page.
pub async fn extract_text_and_tables(
    document: &SourceDocument,
    password: Option<&str>,
    settings: &TableSettings,
) -> Result<TextExtraction, Pdf2HtmlError> {
    let bytes = document.shared_bytes();
    let name = document.name().to_string();
    let password = password.map(str::to_string);
    let settings = *settings;

    tokio::task::spawn_blocking(move || {
        extract_blocking(&bytes, &name, password.as_deref(), &settings)
    })
    .await
    .map_err(|e| Pdf2HtmlError::Internal(format!("Text extraction task panicked: {}", e)))?
}

/// Blocking implementation of text/table extraction.
fn extract_blocking(
    bytes: &[u8],
    source_name: &str,
    password: Option<&str>,
    settings: &TableSettings,
) -> Result<TextExtraction, Pdf2HtmlError> {
    let pdfium = pdfium_auto::bind_pdfium_silent()
        .map_err(|e| Pdf2HtmlError::PdfiumBindingFailed(e.to_string()))?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| classify_open_error(&format!("{:?}", e), source_name, password.is_some()))?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("PDF loaded: {} pages", page_count);

    let rulings = ruling::document_rulings(bytes, source_name, password)
        .map_err(|e| e.to_string());
    if let Err(detail) = &rulings {
        warn!("Ruling lines unavailable: {}", detail);
    }

    let mut out = TextExtraction {
        page_count,
        ..TextExtraction::default()
    };

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;

        let text = match page.text() {
            Ok(text) => text,
            Err(e) => {
                let detail = format!("{:?}", e);
                warn!("Page {}: no text layer: {}", page_num, detail);
                out.warnings.push(ExtractionWarning::PageText {
                    page: page_num,
                    detail: detail.clone(),
                });
                out.warnings.push(ExtractionWarning::PageTable {
                    page: page_num,
                    detail,
                });
                continue;
            }
        };

        let page_text = text.all();
        debug!("Page {}: {} chars of text", page_num, page_text.len());
        out.full_text.push_str(&page_text);

        let page_rulings = match &rulings {
            Ok(by_page) => by_page
                .get(&(page_num as u32))
                .cloned()
                .unwrap_or_else(|| Err("page missing from object model".to_string())),
            Err(detail) => Err(detail.clone()),
        };
        let page_rulings = match page_rulings {
            Ok(r) => r,
            Err(detail) => {
                warn!("Page {}: no ruling lines: {}", page_num, detail);
                out.warnings.push(ExtractionWarning::PageTable {
                    page: page_num,
                    detail,
                });
                continue;
            }
        };

        let glyphs = page_glyphs(&text);
        if let Some(rows) = table::find_default_table(&page_rulings, &glyphs, settings) {
            debug!(
                "Page {}: table with {} rows × {} columns",
                page_num,
                rows.len(),
                rows.first().map(Vec::len).unwrap_or(0)
            );
            out.tables.push(ExtractedTable {
                page: page_num,
                rows,
            });
        }
    }

    info!(
        "Extracted {} chars of text and {} tables",
        out.full_text.len(),
        out.tables.len()
    );
    Ok(out)
}

/// Positioned characters of one page. Characters without a box (generated
/// spaces, line breaks) are dropped.
#[allow(deprecated)] // PdfRect field access deprecated in 0.8.28, removed in 0.9.0
fn page_glyphs(text: &PdfPageText) -> Vec<Glyph> {
    text.chars()
        .iter()
        .filter_map(|ch| {
            let c = ch.unicode_char()?;
            let rect = ch.tight_bounds().ok()?;
            Some(Glyph {
                ch: c,
                left: rect.left.value,
                right: rect.right.value,
                bottom: rect.bottom.value,
                top: rect.top.value,
            })
        })
        .collect()
}

/// Map a pdfium load failure onto the input-error taxonomy.
fn classify_open_error(detail: &str, source_name: &str, had_password: bool) -> Pdf2HtmlError {
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            Pdf2HtmlError::WrongPassword {
                source_name: source_name.to_string(),
            }
        } else {
            Pdf2HtmlError::PasswordRequired {
                source_name: source_name.to_string(),
            }
        }
    } else {
        Pdf2HtmlError::CorruptPdf {
            source_name: source_name.to_string(),
            detail: detail.to_string(),
        }
    }
}
