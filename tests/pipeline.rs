//! Pipeline integration tests that need neither a pdfium library nor a
//! network connection.
//!
//! Text extraction goes through pdfium, so the full `convert_*` path lives
//! in `tests/e2e.rs`. Here the image pass, prompt assembly, generation and
//! presentation are chained by hand, and input rejection is checked
//! through the public entry points.

mod common;

use common::{build_pdf, datasheet_pdf, tiny_jpeg, FixturePage, RecordingGenerator};
use edgequake_pdf2html::pipeline::images::extract_images_blocking;
use edgequake_pdf2html::pipeline::llm::generate_html;
use edgequake_pdf2html::pipeline::prompt::assemble_prompt;
use edgequake_pdf2html::pipeline::ruling::document_rulings;
use edgequake_pdf2html::pipeline::table::{find_default_table, Glyph};
use edgequake_pdf2html::prompts::{NO_IMAGES_PLACEHOLDER, NO_TABLES_PLACEHOLDER};
use edgequake_pdf2html::{
    convert_bytes, convert_to_file, extraction_summary, ConversionConfig, ErrorKind,
    ExtractedTable, HtmlArtifact, Pdf2HtmlError, TableSettings, DOWNLOAD_FILE_NAME, MEDIA_TYPE,
};
use std::sync::Arc;

const MODEL_HTML: &str = "<html><body><h1>Spec A</h1><table><tr><td>H1</td></tr></table></body></html>";

fn config_with(generator: Arc<RecordingGenerator>) -> ConversionConfig {
    ConversionConfig::builder()
        .generator(generator)
        .max_retries(0)
        .build()
        .expect("valid config")
}

// ── Input rejection ──────────────────────────────────────────────────────────

#[tokio::test]
async fn non_pdf_upload_never_reaches_the_model() {
    let generator = Arc::new(RecordingGenerator::new(MODEL_HTML));
    let config = config_with(Arc::clone(&generator));

    let err = convert_bytes("notes.txt", b"just some text".to_vec(), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Pdf2HtmlError::NotAPdf { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Input);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let generator = Arc::new(RecordingGenerator::new(MODEL_HTML));
    let config = config_with(Arc::clone(&generator));

    let err = convert_bytes("empty.pdf", Vec::new(), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Pdf2HtmlError::EmptyInput { .. }), "got {err:?}");
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn failed_conversion_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("fake.pdf");
    std::fs::write(&input, b"GIF89a not a pdf").unwrap();
    let out = dir.path().join("out").join(DOWNLOAD_FILE_NAME);

    let generator = Arc::new(RecordingGenerator::new(MODEL_HTML));
    let config = config_with(Arc::clone(&generator));
    let err = convert_to_file(input.to_str().unwrap(), &out, &config)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(!out.exists());
    assert_eq!(generator.calls(), 0);
}

// ── Extraction → prompt → generation → presentation ─────────────────────────

#[tokio::test]
async fn datasheet_images_flow_into_prompt_and_html_comes_back_verbatim() {
    let pdf = datasheet_pdf();
    let images = extract_images_blocking(&pdf, "datasheet.pdf", None).unwrap();
    assert_eq!(images.image_count, 1);
    assert_eq!((images.images[0].page, images.images[0].index), (2, 0));
    assert!(images.markup.starts_with("<img src=\"data:image/jpeg;base64,"));
    assert!(images.markup.contains("alt=\"PDF Image 0\""));

    let tables = vec![ExtractedTable {
        page: 1,
        rows: vec![vec!["H1".into(), "H2".into()], vec!["v1".into(), "v2".into()]],
    }];
    let prompt = assemble_prompt("Spec ASpec B", &tables, &images.markup);
    assert!(prompt.contains("Spec ASpec B"));
    assert!(prompt.contains("H1 | H2\nv1 | v2\n\n"));
    assert!(prompt.contains(&images.markup));

    let generator = Arc::new(RecordingGenerator::new(MODEL_HTML));
    let config = config_with(Arc::clone(&generator));
    let generation = generate_html(generator.as_ref(), &prompt, &config)
        .await
        .unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(generator.last_prompt().as_deref(), Some(prompt.as_str()));
    assert_eq!(generation.attempts, 1);
    assert_eq!(generation.input_tokens, 120);

    let artifact = HtmlArtifact::new(generation.content);
    assert_eq!(artifact.bytes(), MODEL_HTML.as_bytes());
    assert_eq!(artifact.file_name(), "converted_datasheet.html");
    assert_eq!(artifact.media_type(), MEDIA_TYPE);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DOWNLOAD_FILE_NAME);
    artifact.write_to(&path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), MODEL_HTML.as_bytes());

    assert_eq!(
        extraction_summary(tables.len(), images.image_count),
        "Extracted 1 tables and 1 images"
    );
}

/// 12pt Helvetica-sized boxes for `text` with its baseline at `y`.
fn glyphs(text: &str, x: f32, y: f32) -> Vec<Glyph> {
    text.chars()
        .enumerate()
        .map(|(i, ch)| Glyph {
            ch,
            left: x + i as f32 * 7.0,
            right: x + (i + 1) as f32 * 7.0,
            bottom: y,
            top: y + 9.0,
        })
        .collect()
}

#[test]
fn datasheet_rulings_frame_its_table() {
    let by_page = document_rulings(&datasheet_pdf(), "datasheet.pdf", None).unwrap();
    assert_eq!(by_page.len(), 2);
    let page1 = by_page[&1].as_ref().unwrap();
    assert_eq!(page1.len(), 6);
    assert!(by_page[&2].as_ref().unwrap().is_empty());

    let mut text = glyphs("Spec A", 72.0, 720.0);
    for (s, x, y) in [("H1", 72.0, 600.0), ("H2", 300.0, 600.0), ("v1", 72.0, 585.0), ("v2", 300.0, 585.0)] {
        text.extend(glyphs(s, x, y));
    }
    let rows = find_default_table(page1, &text, &TableSettings::default()).unwrap();
    assert_eq!(rows, vec![vec!["H1", "H2"], vec!["v1", "v2"]]);
}

#[test]
fn empty_document_gets_both_placeholders() {
    let pdf = build_pdf(vec![FixturePage::default(), FixturePage::default()]);
    let images = extract_images_blocking(&pdf, "blank.pdf", None).unwrap();
    assert_eq!(images.image_count, 0);

    let prompt = assemble_prompt("", &[], &images.markup);
    assert!(prompt.contains(NO_TABLES_PLACEHOLDER));
    assert!(prompt.contains(NO_IMAGES_PLACEHOLDER));
    assert_eq!(extraction_summary(0, 0), "Extracted 0 tables and 0 images");
}

#[test]
fn images_are_listed_in_page_order() {
    let pdf = build_pdf(vec![
        FixturePage::default(),
        FixturePage::default().image(tiny_jpeg()),
        FixturePage::default().image(tiny_jpeg()),
    ]);
    let images = extract_images_blocking(&pdf, "three.pdf", None).unwrap();
    let positions: Vec<(usize, usize)> = images.images.iter().map(|i| (i.page, i.index)).collect();
    assert_eq!(positions, vec![(2, 0), (3, 0)]);
    assert_eq!(images.markup.matches("<img ").count(), 2);
}

#[test]
fn preview_keeps_download_untouched() {
    let html = "<html><body><script>alert(1)</script><p>ok</p></body></html>";
    let artifact = HtmlArtifact::new(html);

    let frame = artifact.preview_frame(600, true);
    assert!(frame.contains("sandbox=\"allow-same-origin\""));
    assert!(!frame.contains("alert(1)"));

    assert_eq!(artifact.as_str(), html);
    assert!(artifact
        .download_data_uri()
        .starts_with("data:text/html;base64,"));
}
