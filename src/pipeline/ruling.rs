//! Ruling lines from page content streams via `lopdf`.
//!
//! pdfium exposes text well but not the vector paths a table border is made
//! of, so this pass decodes each page's content stream and replays the path
//! operators. Stroked or filled straight segments that run horizontally or
//! vertically become [`Ruling`]s in page space. Form XObjects drawn with
//! `Do` are replayed too, under their `/Matrix`.

use crate::error::Pdf2HtmlError;
use crate::pipeline::images::load_document;
use crate::pipeline::table::Ruling;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use tracing::debug;

/// Form XObjects nest at most this deep.
const MAX_FORM_DEPTH: usize = 8;

/// Rulings for every page, keyed by 1-based page number. A page whose
/// content cannot be decoded maps to the reason.
pub fn document_rulings(
    bytes: &[u8],
    source_name: &str,
    password: Option<&str>,
) -> Result<BTreeMap<u32, Result<Vec<Ruling>, String>>, Pdf2HtmlError> {
    let doc = load_document(bytes, source_name, password)?;
    Ok(doc
        .get_pages()
        .into_iter()
        .map(|(num, id)| (num, page_rulings(&doc, id)))
        .collect())
}

/// Rulings drawn on one page.
pub fn page_rulings(doc: &Document, page_id: ObjectId) -> Result<Vec<Ruling>, String> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|e| format!("unreadable content stream: {}", e))?;
    let content = Content::decode(&data).map_err(|e| format!("cannot decode content: {}", e))?;

    let (inline, referenced) = doc.get_page_resources(page_id);
    let mut resources: Vec<&Dictionary> = inline.into_iter().collect();
    resources.extend(referenced.into_iter().filter_map(|id| doc.get_dictionary(id).ok()));

    let mut painter = Painter {
        doc,
        rulings: Vec::new(),
        forms: Vec::new(),
    };
    painter.run(&content.operations, &resources, Matrix::IDENTITY);
    debug!("Page object {:?}: {} rulings", page_id, painter.rulings.len());
    Ok(painter.rulings)
}

/// Affine transform `[a b c d e f]` as PDF writes it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        let n = numbers(operands)?;
        <[f32; 6]>::try_from(n.as_slice()).ok().map(Matrix)
    }

    /// `self` applied first, then `outer`.
    fn then(&self, outer: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [oa, ob, oc, od, oe, of] = outer.0;
        Matrix([
            a * oa + b * oc,
            a * ob + b * od,
            c * oa + d * oc,
            c * ob + d * od,
            e * oa + f * oc + oe,
            e * ob + f * od + of,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }
}

fn numbers(operands: &[Object]) -> Option<Vec<f32>> {
    operands.iter().map(|o| o.as_float().ok()).collect()
}

struct Painter<'a> {
    doc: &'a Document,
    rulings: Vec<Ruling>,
    /// Forms currently being replayed.
    forms: Vec<ObjectId>,
}

#[derive(Default)]
struct Path {
    segments: Vec<(f32, f32, f32, f32)>,
    start: Option<(f32, f32)>,
    current: Option<(f32, f32)>,
}

impl Path {
    fn move_to(&mut self, p: (f32, f32)) {
        self.start = Some(p);
        self.current = Some(p);
    }

    fn line_to(&mut self, p: (f32, f32)) {
        if let Some(c) = self.current {
            self.segments.push((c.0, c.1, p.0, p.1));
        }
        self.current = Some(p);
    }

    fn close(&mut self) {
        if let Some(s) = self.start {
            self.line_to(s);
        }
    }
}

impl Painter<'_> {
    fn run(&mut self, operations: &[Operation], resources: &[&Dictionary], base: Matrix) {
        let mut ctm = base;
        let mut saved: Vec<Matrix> = Vec::new();
        let mut path = Path::default();

        for op in operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => {
                    if let Some(m) = saved.pop() {
                        ctm = m;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        ctm = m.then(&ctm);
                    }
                }
                "m" => {
                    if let Some([x, y]) = numbers(operands).and_then(|n| <[f32; 2]>::try_from(n).ok()) {
                        path.move_to(ctm.apply(x, y));
                    }
                }
                "l" => {
                    if let Some([x, y]) = numbers(operands).and_then(|n| <[f32; 2]>::try_from(n).ok()) {
                        path.line_to(ctm.apply(x, y));
                    }
                }
                // Curves are never rulings; only the end point matters.
                "c" | "v" | "y" => {
                    if let Some(n) = numbers(operands) {
                        if let [.., x, y] = n.as_slice() {
                            path.current = Some(ctm.apply(*x, *y));
                        }
                    }
                }
                "re" => {
                    if let Some([x, y, w, h]) = numbers(operands).and_then(|n| <[f32; 4]>::try_from(n).ok()) {
                        path.move_to(ctm.apply(x, y));
                        path.line_to(ctm.apply(x + w, y));
                        path.line_to(ctm.apply(x + w, y + h));
                        path.line_to(ctm.apply(x, y + h));
                        path.close();
                    }
                }
                "h" => path.close(),
                "S" | "f" | "F" | "f*" | "B" | "B*" => self.paint(&mut path),
                "s" | "b" | "b*" => {
                    path.close();
                    self.paint(&mut path);
                }
                "n" => path = Path::default(),
                "Do" => {
                    if let Some(Ok(name)) = operands.first().map(Object::as_name) {
                        self.draw_form(name, resources, ctm);
                    }
                }
                _ => {}
            }
        }
    }

    fn paint(&mut self, path: &mut Path) {
        for &(x0, y0, x1, y1) in &path.segments {
            if let Some(r) = Ruling::from_segment(x0, y0, x1, y1) {
                self.rulings.push(r);
            }
        }
        *path = Path::default();
    }

    fn draw_form(&mut self, name: &[u8], resources: &[&Dictionary], ctm: Matrix) {
        let doc = self.doc;
        let Some(id) = resources.iter().find_map(|r| xobject_ref(doc, r, name)) else {
            return;
        };
        if self.forms.contains(&id) || self.forms.len() >= MAX_FORM_DEPTH {
            return;
        }
        let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
            return;
        };
        if stream.dict.get(b"Subtype").and_then(Object::as_name).ok() != Some(b"Form".as_slice()) {
            return;
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let Ok(content) = Content::decode(&data) else {
            debug!("Form {:?}: content not decodable", id);
            return;
        };
        let matrix = stream
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|m| Matrix::from_operands(m))
            .unwrap_or(Matrix::IDENTITY);
        let own = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve_dict(doc, o));
        let form_resources: Vec<&Dictionary> = match own {
            Some(d) => vec![d],
            None => resources.to_vec(),
        };

        self.forms.push(id);
        self.run(&content.operations, &form_resources, matrix.then(&ctm));
        self.forms.pop();
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

fn xobject_ref(doc: &Document, resources: &Dictionary, name: &[u8]) -> Option<ObjectId> {
    resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
        .and_then(|x| x.get(name).ok())
        .and_then(|o| o.as_reference().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::table::Orientation;
    use lopdf::{dictionary, Stream};

    /// A one-page document with the given content and XObjects.
    fn page_with(content: &str, xobjects: Dictionary) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    fn sorted(mut rulings: Vec<Ruling>) -> Vec<(Orientation, f32, f32, f32)> {
        rulings.sort_by(|a, b| {
            (a.orientation == Orientation::Vertical)
                .cmp(&(b.orientation == Orientation::Vertical))
                .then(a.position.total_cmp(&b.position))
                .then(a.start.total_cmp(&b.start))
        });
        rulings
            .into_iter()
            .map(|r| (r.orientation, r.position, r.start, r.end))
            .collect()
    }

    #[test]
    fn stroked_lines_become_rulings() {
        let (doc, page) = page_with(
            "0.5 w 100 700 m 300 700 l S 100 660 m 100 700 l S 10 10 m 50 40 l S",
            Dictionary::new(),
        );
        let rulings = page_rulings(&doc, page).unwrap();
        assert_eq!(
            sorted(rulings),
            vec![
                (Orientation::Horizontal, 700.0, 100.0, 300.0),
                (Orientation::Vertical, 100.0, 660.0, 700.0),
            ]
        );
    }

    #[test]
    fn rectangle_gives_four_edges_under_the_ctm() {
        let (doc, page) = page_with("q 1 0 0 1 50 100 cm 0 0 200 40 re f Q", Dictionary::new());
        let rulings = page_rulings(&doc, page).unwrap();
        assert_eq!(
            sorted(rulings),
            vec![
                (Orientation::Horizontal, 100.0, 50.0, 250.0),
                (Orientation::Horizontal, 140.0, 50.0, 250.0),
                (Orientation::Vertical, 50.0, 100.0, 140.0),
                (Orientation::Vertical, 250.0, 100.0, 140.0),
            ]
        );
    }

    #[test]
    fn restore_drops_the_transform_and_n_discards() {
        let (doc, page) = page_with(
            "q 2 0 0 2 0 0 cm Q 10 20 m 30 20 l S 0 0 m 0 500 l n",
            Dictionary::new(),
        );
        let rulings = page_rulings(&doc, page).unwrap();
        assert_eq!(sorted(rulings), vec![(Orientation::Horizontal, 20.0, 10.0, 30.0)]);
    }

    #[test]
    fn form_xobjects_are_replayed_once() {
        let (mut doc, page) = page_with("q 1 0 0 1 0 100 cm /Fm0 Do Q", Dictionary::new());
        let form_id = doc.new_object_id();
        // The form draws a line and then itself again.
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                    "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 10.into(), 0.into()],
                    "Resources" => dictionary! { "XObject" => dictionary! { "Fm0" => form_id } },
                },
                b"0 0 m 100 0 l S /Fm0 Do".to_vec(),
            )),
        );
        let page_dict = doc.get_dictionary_mut(page).unwrap();
        page_dict.set(
            "Resources",
            dictionary! { "XObject" => dictionary! { "Fm0" => form_id } },
        );

        let rulings = page_rulings(&doc, page).unwrap();
        assert_eq!(sorted(rulings), vec![(Orientation::Horizontal, 100.0, 10.0, 110.0)]);
    }

    #[test]
    fn every_page_is_keyed_by_number() {
        let (mut doc, _) = page_with("0 0 m 10 0 l S", Dictionary::new());
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let map = document_rulings(&bytes, "lines.pdf", None).unwrap();
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(map[&1].as_ref().unwrap().len(), 1);
    }
}
