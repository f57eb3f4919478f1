//! Prompt assembly: full text + flattened tables + image tags → one string.
//!
//! Pure templating. Nothing is truncated or summarised; a very large PDF
//! produces a very large prompt.

use crate::output::ExtractedTable;
use crate::prompts::{self, NO_IMAGES_PLACEHOLDER, NO_TABLES_PLACEHOLDER};

/// Flatten tables to pipe-separated text.
///
/// Rows are joined by `\n`, cells by `" | "`, and every table (including
/// the last) is followed by a blank line.
pub fn flatten_tables(tables: &[ExtractedTable]) -> String {
    let mut out = String::new();
    for table in tables {
        let rows: Vec<String> = table.rows.iter().map(|row| row.join(" | ")).collect();
        out.push_str(&rows.join("\n"));
        out.push_str("\n\n");
    }
    out
}

/// Build the user message sent to the model.
pub fn assemble_prompt(full_text: &str, tables: &[ExtractedTable], images_markup: &str) -> String {
    let flattened = flatten_tables(tables);
    let tables_section = if flattened.is_empty() {
        NO_TABLES_PLACEHOLDER
    } else {
        flattened.as_str()
    };
    let images_section = if images_markup.is_empty() {
        NO_IMAGES_PLACEHOLDER
    } else {
        images_markup
    };
    prompts::user_prompt(full_text, tables_section, images_section)
}
