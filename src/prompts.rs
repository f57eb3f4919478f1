//! Prompt text for LLM-based PDF-to-HTML conversion.
//!
//! Every fixed string the model sees lives here so a prompt change is a
//! one-file edit and tests can inspect the template without a model.
//!
//! Callers can override the system message via
//! [`crate::config::ConversionConfig::system_prompt`]; the user-message
//! template is fixed.

/// Default system message.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional document-to-HTML converter.";

pub const TEXT_SECTION_HEADER: &str = "========== TEXT CONTENT ==========";
pub const TABLE_SECTION_HEADER: &str = "========== TABLE DATA ==========";
pub const IMAGE_SECTION_HEADER: &str = "========== IMAGE TAGS ==========";

/// Stands in for the table section when no page yielded a table.
pub const NO_TABLES_PLACEHOLDER: &str = "No tables detected.";

/// Stands in for the image section when the document has no usable images.
pub const NO_IMAGES_PLACEHOLDER: &str = "No images detected.";

/// Instructions that open the user message.
pub const TASK_INSTRUCTIONS: &str = r#"You are an expert in converting technical datasheets into structured HTML.

Your task:
- Convert the extracted text and tables below into a semantic, styled HTML page.
- Use appropriate tags (<h1>, <h2>, <p>, <table>, <tr>, <td>, <img>).
- Include provided images in logical positions.
- Use inline CSS to make it look visually similar to the original layout."#;

/// Closing line of the user message.
pub const OUTPUT_INSTRUCTION: &str = "Return only the final HTML page (no explanations).";

/// Fill the user-message template.
///
/// Sections are inserted verbatim; substituting placeholders for empty
/// sections is the caller's job (see [`crate::pipeline::prompt`]).
pub fn user_prompt(full_text: &str, tables: &str, images: &str) -> String {
    format!(
        "{TASK_INSTRUCTIONS}\n\n\
         {TEXT_SECTION_HEADER}\n{full_text}\n\n\
         {TABLE_SECTION_HEADER}\n{tables}\n\n\
         {IMAGE_SECTION_HEADER}\n{images}\n\n\
         {OUTPUT_INSTRUCTION}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_names_the_semantic_tags() {
        for tag in ["<h1>", "<h2>", "<p>", "<table>", "<tr>", "<td>", "<img>"] {
            assert!(TASK_INSTRUCTIONS.contains(tag), "missing {tag}");
        }
        assert!(TASK_INSTRUCTIONS.contains("inline CSS"));
    }

    #[test]
    fn sections_appear_in_order() {
        let p = user_prompt("T", "TB", "IM");
        let t = p.find(TEXT_SECTION_HEADER).unwrap();
        let tb = p.find(TABLE_SECTION_HEADER).unwrap();
        let im = p.find(IMAGE_SECTION_HEADER).unwrap();
        let end = p.find(OUTPUT_INSTRUCTION).unwrap();
        assert!(t < tb && tb < im && im < end);
    }
}
