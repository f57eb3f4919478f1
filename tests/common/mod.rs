//! Shared fixtures for the integration tests: small PDFs built with lopdf
//! and an in-process generator that records what it was asked.

#![allow(dead_code)]

use edgequake_pdf2html::{
    GenerationFailure, GenerationOptions, GenerationReply, HtmlGenerator, PromptMessage,
    PromptRole,
};
use futures::future::BoxFuture;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One page of a fixture PDF.
#[derive(Default)]
pub struct FixturePage {
    /// `(x, y, text)` drawn in 12pt Helvetica.
    pub lines: Vec<(f32, f32, String)>,
    /// JPEG bytes placed as image `Im0`.
    pub jpeg: Option<Vec<u8>>,
    /// `(x0, y0, x1, y1)` segments stroked as ruling lines.
    pub rulings: Vec<(f32, f32, f32, f32)>,
}

impl FixturePage {
    pub fn text(mut self, x: f32, y: f32, text: &str) -> Self {
        self.lines.push((x, y, text.to_string()));
        self
    }

    pub fn image(mut self, jpeg: Vec<u8>) -> Self {
        self.jpeg = Some(jpeg);
        self
    }

    pub fn ruling(mut self, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        self.rulings.push((x0, y0, x1, y1));
        self
    }

    /// Stroke a full grid through the given column and row positions.
    pub fn grid(mut self, xs: &[f32], ys: &[f32]) -> Self {
        let (left, right) = (xs[0], xs[xs.len() - 1]);
        let (top, bottom) = (ys[0], ys[ys.len() - 1]);
        for &y in ys {
            self = self.ruling(left, y, right, y);
        }
        for &x in xs {
            self = self.ruling(x, top, x, bottom);
        }
        self
    }
}

/// Serialise `pages` into PDF bytes.
pub fn build_pdf(pages: Vec<FixturePage>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for page in pages {
        let mut content = String::new();
        for (x, y, text) in &page.lines {
            content.push_str(&format!(
                "BT /F1 12 Tf {x} {y} Td ({}) Tj ET\n",
                escape_pdf_string(text)
            ));
        }

        if !page.rulings.is_empty() {
            content.push_str("0.5 w\n");
            for (x0, y0, x1, y1) in &page.rulings {
                content.push_str(&format!("{x0} {y0} m {x1} {y1} l S\n"));
            }
        }

        let mut xobjects = Dictionary::new();
        if let Some(jpeg) = page.jpeg {
            let (w, h) = image::load_from_memory(&jpeg)
                .map(|img| (img.width() as i64, img.height() as i64))
                .unwrap_or((1, 1));
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => w,
                    "Height" => h,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            );
            xobjects.set("Im0", doc.add_object(stream));
            content.push_str("q 120 0 0 120 72 300 cm /Im0 Do Q\n");
        }

        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => xobjects,
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save fixture pdf");
    buf
}

fn escape_pdf_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// A real 4×4 JPEG.
pub fn tiny_jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .expect("encode jpeg");
    buf.into_inner()
}

/// The two-page datasheet: a title per page, a ruled 2×2 table on page 1
/// and one image on page 2.
pub fn datasheet_pdf() -> Vec<u8> {
    build_pdf(vec![
        FixturePage::default()
            .text(72.0, 720.0, "Spec A")
            .text(72.0, 600.0, "H1")
            .text(300.0, 600.0, "H2")
            .text(72.0, 585.0, "v1")
            .text(300.0, 585.0, "v2")
            .grid(&[66.0, 290.0, 500.0], &[612.0, 596.0, 580.0]),
        FixturePage::default()
            .text(72.0, 720.0, "Spec B")
            .image(tiny_jpeg()),
    ])
}

/// Returns a fixed reply and remembers every user prompt it received.
pub struct RecordingGenerator {
    reply: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl HtmlGenerator for RecordingGenerator {
    fn name(&self) -> String {
        "recording".into()
    }

    fn generate<'a>(
        &'a self,
        messages: &'a [PromptMessage],
        _options: &'a GenerationOptions,
    ) -> BoxFuture<'a, Result<GenerationReply, GenerationFailure>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(user) = messages.iter().find(|m| m.role == PromptRole::User) {
                self.prompts.lock().unwrap().push(user.content.clone());
            }
            Ok(GenerationReply {
                content: self.reply.clone(),
                input_tokens: 120,
                output_tokens: 40,
            })
        })
    }
}
