//! Embedded image extraction via `lopdf`.
//!
//! pdfium renders and reads text well but does not hand back an image's
//! stored bytes, so this pass walks the object model instead: page →
//! resource dictionaries → `XObject` entries with `Subtype /Image`, looking
//! inside `Subtype /Form` XObjects' own resources as well.
//!
//! JPEG and JPEG 2000 streams are passed through as-is. Raw 8-bit sample
//! streams are wrapped as PNG. Anything else (JBIG2, CCITT, indexed or
//! 1-bit images, image masks) is skipped with an
//! [`ExtractionWarning::ImageSkipped`].

use crate::error::{ExtractionWarning, Pdf2HtmlError};
use crate::output::ImageExtraction;
use crate::pipeline::encode::{self, RawImage};
use crate::pipeline::input::SourceDocument;
use crate::prompts::NO_IMAGES_PLACEHOLDER;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

/// Extract every embedded image as an `<img>` tag, page by page.
pub async fn extract_images(
    document: &SourceDocument,
    password: Option<&str>,
) -> Result<ImageExtraction, Pdf2HtmlError> {
    let bytes = document.shared_bytes();
    let name = document.name().to_string();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_images_blocking(&bytes, &name, password.as_deref()))
        .await
        .map_err(|e| Pdf2HtmlError::Internal(format!("Image extraction task panicked: {}", e)))?
}

/// Blocking implementation of [`extract_images`].
pub fn extract_images_blocking(
    bytes: &[u8],
    source_name: &str,
    password: Option<&str>,
) -> Result<ImageExtraction, Pdf2HtmlError> {
    let doc = load_document(bytes, source_name, password)?;

    let mut out = ImageExtraction::default();

    // BTreeMap: page numbers ascending.
    for (page_num, page_id) in doc.get_pages() {
        let page = page_num as usize;
        for (index, (xobject_name, image_id)) in page_image_ids(&doc, page_id).into_iter().enumerate() {
            match read_image(&doc, image_id) {
                Ok(raw) => {
                    let encoded = encode::encode_image(page, index, &raw);
                    out.markup.push_str(&encode::img_tag(&encoded));
                    out.images.push(encoded);
                }
                Err(detail) => {
                    warn!("Page {}: image {} ({}) skipped: {}", page, index, xobject_name, detail);
                    out.warnings.push(ExtractionWarning::ImageSkipped { page, index, detail });
                }
            }
        }
    }

    out.image_count = out.images.len();
    if out.images.is_empty() {
        out.markup = NO_IMAGES_PLACEHOLDER.to_string();
    }
    info!(
        "Extracted {} images ({} skipped)",
        out.image_count,
        out.warnings.len()
    );
    Ok(out)
}

/// Parse a document and unlock it with `password` (or the empty user
/// password).
pub fn load_document(
    bytes: &[u8],
    source_name: &str,
    password: Option<&str>,
) -> Result<Document, Pdf2HtmlError> {
    let mut doc = Document::load_mem(bytes).map_err(|e| Pdf2HtmlError::CorruptPdf {
        source_name: source_name.to_string(),
        detail: e.to_string(),
    })?;

    if doc.is_encrypted() {
        doc.decrypt(password.unwrap_or("")).map_err(|_| match password {
            Some(_) => Pdf2HtmlError::WrongPassword {
                source_name: source_name.to_string(),
            },
            None => Pdf2HtmlError::PasswordRequired {
                source_name: source_name.to_string(),
            },
        })?;
    }
    Ok(doc)
}

/// Image XObjects visible from a page, in resource order, deduplicated by
/// object id. Inherited resources come after the page's own; images used by
/// Form XObjects are listed where the form appears.
pub fn page_image_ids(doc: &Document, page_id: ObjectId) -> Vec<(String, ObjectId)> {
    let (inline, referenced) = doc.get_page_resources(page_id);

    let mut dicts: Vec<&Dictionary> = Vec::new();
    if let Some(d) = inline {
        dicts.push(d);
    }
    for id in referenced {
        if let Ok(d) = doc.get_dictionary(id) {
            dicts.push(d);
        }
    }

    let mut walk = ImageWalk::default();
    for resources in dicts {
        walk.visit(doc, resources);
    }
    walk.found
}

#[derive(Default)]
struct ImageWalk {
    found: Vec<(String, ObjectId)>,
    forms: Vec<ObjectId>,
}

impl ImageWalk {
    fn visit(&mut self, doc: &Document, resources: &Dictionary) {
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_dict().ok())
        else {
            return;
        };
        for (name, obj) in xobjects.iter() {
            let Ok(id) = obj.as_reference() else { continue };
            let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
                continue;
            };
            match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                Ok(b"Image") => {
                    if !self.found.iter().any(|(_, seen)| *seen == id) {
                        self.found.push((String::from_utf8_lossy(name).into_owned(), id));
                    }
                }
                Ok(b"Form") => {
                    // Forms may reference themselves.
                    if self.forms.contains(&id) {
                        continue;
                    }
                    self.forms.push(id);
                    if let Some(inner) = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|o| resolve(doc, o))
                        .and_then(|o| o.as_dict().ok())
                    {
                        self.visit(doc, inner);
                    }
                }
                _ => {}
            }
        }
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj.as_reference() {
        Ok(id) => doc.get_object(id).ok(),
        Err(_) => Some(obj),
    }
}

/// Filter names applied to a stream, outermost first.
fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Bytes of one image in a displayable container, or why it was skipped.
fn read_image(doc: &Document, id: ObjectId) -> Result<RawImage, String> {
    let stream = doc
        .get_object(id)
        .and_then(Object::as_stream)
        .map_err(|e| format!("unreadable image object: {}", e))?;

    let filters = filters(stream);
    let names: Vec<&[u8]> = filters.iter().map(Vec::as_slice).collect();
    match names.as_slice() {
        [b"DCTDecode"] => Ok(RawImage {
            format: "jpeg",
            bytes: stream.content.clone(),
        }),
        [b"JPXDecode"] => Ok(RawImage {
            format: "jpx",
            bytes: stream.content.clone(),
        }),
        [] => raw_samples_to_png(doc, stream, &stream.content),
        [b"FlateDecode"] | [b"LZWDecode"] => {
            let samples = decompress_samples(stream)?;
            raw_samples_to_png(doc, stream, &samples)
        }
        other => Err(format!(
            "unsupported filter {}",
            other
                .iter()
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .collect::<Vec<_>>()
                .join("+")
        )),
    }
}

/// lopdf declines to decompress streams marked `/Subtype /Image`, so the
/// filters run on a copy without it.
fn decompress_samples(stream: &Stream) -> Result<Vec<u8>, String> {
    let mut dict = stream.dict.clone();
    dict.remove(b"Subtype");
    Stream::new(dict, stream.content.clone())
        .decompressed_content()
        .map_err(|e| format!("cannot decompress: {}", e))
}

fn raw_samples_to_png(doc: &Document, stream: &Stream, samples: &[u8]) -> Result<RawImage, String> {
    let dict = &stream.dict;
    if dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false)
    {
        return Err("image mask".into());
    }

    let width = u32::try_from(dict_int(doc, dict, b"Width")?).map_err(|_| "negative width".to_string())?;
    let height = u32::try_from(dict_int(doc, dict, b"Height")?).map_err(|_| "negative height".to_string())?;
    let bpc = dict_int(doc, dict, b"BitsPerComponent")?;
    if bpc != 8 {
        return Err(format!("{} bits per component", bpc));
    }

    let components = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| resolve(doc, o))
        .map(|cs| color_components(doc, cs))
        .unwrap_or(Err("missing /ColorSpace".into()))?;

    debug!("Raw image {}x{} with {} components", width, height, components);
    encode::samples_to_png(width, height, components, samples)
}

fn dict_int(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<i64, String> {
    dict.get(key)
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_i64().ok())
        .ok_or_else(|| format!("missing /{}", String::from_utf8_lossy(key)))
}

/// Number of samples per pixel for the colour spaces we can wrap as PNG.
fn color_components(doc: &Document, cs: &Object) -> Result<u8, String> {
    match cs {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" => Ok(1),
            b"DeviceRGB" | b"CalRGB" => Ok(3),
            b"DeviceCMYK" => Ok(4),
            other => Err(format!("colour space {}", String::from_utf8_lossy(other))),
        },
        Object::Array(items) => {
            let family = items.first().and_then(|o| o.as_name().ok()).unwrap_or_default();
            match family {
                b"ICCBased" => {
                    let n = items
                        .get(1)
                        .and_then(|o| resolve(doc, o))
                        .and_then(|o| o.as_stream().ok())
                        .and_then(|s| s.dict.get(b"N").ok())
                        .and_then(|o| o.as_i64().ok())
                        .ok_or_else(|| "ICCBased profile without /N".to_string())?;
                    match n {
                        1 | 3 | 4 => Ok(n as u8),
                        other => Err(format!("ICCBased with {} components", other)),
                    }
                }
                b"CalGray" => Ok(1),
                b"CalRGB" => Ok(3),
                other => Err(format!("colour space {}", String::from_utf8_lossy(other))),
            }
        }
        _ => Err("malformed /ColorSpace".into()),
    }
}
