//! Values produced by each pipeline stage and by a whole conversion.
//!
//! Every type here is created once and only flows forward; nothing is
//! mutated after the stage that built it returns.

use crate::error::ExtractionWarning;
use serde::{Deserialize, Serialize};

/// One table captured from a page: rows of cell strings.
///
/// Missing cells are `""`, never absent, so every row of a table has the
/// same number of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTable {
    /// 1-indexed page the table was found on.
    pub page: usize,
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

/// Result of the text/table pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextExtraction {
    /// Page texts concatenated in page order, no separators.
    pub full_text: String,
    /// At most one table per page, in page order.
    pub tables: Vec<ExtractedTable>,
    pub page_count: usize,
    pub warnings: Vec<ExtractionWarning>,
}

/// One embedded image after encoding. The binary payload is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    /// 1-indexed page.
    pub page: usize,
    /// 0-indexed position in the page's image list.
    pub index: usize,
    /// Format extension as used in the data URI (`jpeg`, `png`, `jpx`).
    pub format: String,
    /// `data:image/{format};base64,…`
    pub data_uri: String,
}

/// Result of the image pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageExtraction {
    /// Concatenated `<img>` tags, page order.
    pub markup: String,
    pub images: Vec<EncodedImage>,
    /// Reporting only; nothing downstream depends on it.
    pub image_count: usize,
    pub warnings: Vec<ExtractionWarning>,
}

/// Timing and token accounting for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub page_count: usize,
    pub table_count: usize,
    pub image_count: usize,
    pub skipped_images: usize,
    pub prompt_chars: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Generation attempts made, including the successful one.
    pub attempts: u32,
    pub extraction_duration_ms: u64,
    pub generation_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The model's response, byte-for-byte.
    pub html: String,
    pub text: TextExtraction,
    pub images: ImageExtraction,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// All non-fatal warnings from both extraction passes, in stage order.
    pub fn warnings(&self) -> impl Iterator<Item = &ExtractionWarning> {
        self.text.warnings.iter().chain(self.images.warnings.iter())
    }

    /// The one-line summary shown after extraction.
    pub fn extraction_summary(&self) -> String {
        extraction_summary(self.text.tables.len(), self.images.image_count)
    }
}

/// Both extraction passes plus the prompt they produce; no model involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub text: TextExtraction,
    pub images: ImageExtraction,
    pub prompt: String,
}

impl ExtractionOutput {
    pub fn extraction_summary(&self) -> String {
        extraction_summary(self.text.tables.len(), self.images.image_count)
    }
}

/// `"Extracted N tables and M images"`.
pub fn extraction_summary(tables: usize, images: usize) -> String {
    format!("Extracted {tables} tables and {images} images")
}
