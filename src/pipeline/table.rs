//! Default-table detection from ruling lines (pdfplumber's "lines"
//! strategy).
//!
//! ```text
//! rulings ──▶ snap ──▶ join ──▶ intersections ──▶ cells ──▶ tables ──▶ cell text
//! ```
//!
//! Horizontal and vertical path segments are the page's rulings
//! ([`crate::pipeline::ruling`] collects them). Parallel rulings that nearly
//! line up are snapped onto one position, and collinear pieces are joined.
//! Every crossing of a horizontal and a vertical ruling is an intersection.
//! Four connected intersections enclose a cell, and cells that share a
//! corner form one table. Cell text comes from the glyphs whose centre lies
//! inside the cell.
//!
//! Prose and running headers draw no rulings, so they never form a table.
//! Everything here is pure geometry in PDF points (y grows upwards).

use crate::error::Pdf2HtmlError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One character with its tight bounding box in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl Glyph {
    pub fn width(&self) -> f32 {
        (self.right - self.left).abs()
    }

    pub fn height(&self) -> f32 {
        (self.top - self.bottom).abs()
    }

    fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// An axis-aligned ruling segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruling {
    pub orientation: Orientation,
    /// y of a horizontal ruling, x of a vertical one.
    pub position: f32,
    /// Extent along the ruling, `start <= end`.
    pub start: f32,
    pub end: f32,
}

impl Ruling {
    pub fn horizontal(y: f32, x0: f32, x1: f32) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            position: y,
            start: x0.min(x1),
            end: x0.max(x1),
        }
    }

    pub fn vertical(x: f32, y0: f32, y1: f32) -> Self {
        Self {
            orientation: Orientation::Vertical,
            position: x,
            start: y0.min(y1),
            end: y0.max(y1),
        }
    }

    /// Classify a path segment. Slanted segments are not rulings.
    pub fn from_segment(x0: f32, y0: f32, x1: f32, y1: f32) -> Option<Self> {
        const AXIS_TOLERANCE: f32 = 0.5;
        if (y1 - y0).abs() <= AXIS_TOLERANCE {
            Some(Self::horizontal((y0 + y1) / 2.0, x0, x1))
        } else if (x1 - x0).abs() <= AXIS_TOLERANCE {
            Some(Self::vertical((x0 + x1) / 2.0, y0, y1))
        } else {
            None
        }
    }

    pub fn length(&self) -> f32 {
        self.end - self.start
    }

    fn is_finite(&self) -> bool {
        self.position.is_finite() && self.start.is_finite() && self.end.is_finite()
    }
}

/// Tolerances for [`find_tables`], in points. The defaults are pdfplumber's.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableSettings {
    /// Parallel rulings closer than this are moved onto their mean position.
    pub snap_tolerance: f32,
    /// Collinear rulings separated by at most this are merged.
    pub join_tolerance: f32,
    /// Rulings shorter than this after joining are dropped.
    pub edge_min_length: f32,
    /// How far a ruling may stop short of another and still cross it.
    pub intersection_tolerance: f32,
    /// A wider horizontal gap between glyphs inserts a space in cell text.
    pub text_x_tolerance: f32,
    /// Glyphs whose centres are this close vertically share a text line.
    pub text_y_tolerance: f32,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            edge_min_length: 3.0,
            intersection_tolerance: 3.0,
            text_x_tolerance: 3.0,
            text_y_tolerance: 3.0,
        }
    }
}

impl TableSettings {
    pub fn validate(&self) -> Result<(), Pdf2HtmlError> {
        let values = [
            ("snap_tolerance", self.snap_tolerance),
            ("join_tolerance", self.join_tolerance),
            ("edge_min_length", self.edge_min_length),
            ("intersection_tolerance", self.intersection_tolerance),
            ("text_x_tolerance", self.text_x_tolerance),
            ("text_y_tolerance", self.text_y_tolerance),
        ];
        for (name, value) in values {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Pdf2HtmlError::InvalidConfig(format!(
                    "table setting {name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    left: f32,
    bottom: f32,
    right: f32,
    top: f32,
}

impl Cell {
    fn corners(&self) -> [(f32, f32); 4] {
        [
            (self.left, self.top),
            (self.right, self.top),
            (self.left, self.bottom),
            (self.right, self.bottom),
        ]
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.bottom && y <= self.top
    }
}

#[derive(Debug, Clone)]
struct Intersection {
    x: f32,
    y: f32,
    /// Indices of the horizontal rulings crossing here.
    horizontal: Vec<usize>,
    /// Indices of the vertical rulings crossing here.
    vertical: Vec<usize>,
}

/// Every ruled table on the page, top to bottom, as rows of cell text.
pub fn find_tables(
    rulings: &[Ruling],
    glyphs: &[Glyph],
    settings: &TableSettings,
) -> Vec<Vec<Vec<String>>> {
    detect(rulings, settings)
        .iter()
        .map(|cells| table_rows(cells, glyphs, settings))
        .collect()
}

/// The page's default table: the one with the most cells, the topmost
/// (then leftmost) on a tie.
pub fn find_default_table(
    rulings: &[Ruling],
    glyphs: &[Glyph],
    settings: &TableSettings,
) -> Option<Vec<Vec<String>>> {
    let tables = detect(rulings, settings);
    let mut best: Option<&Vec<Cell>> = None;
    for table in &tables {
        if best.map_or(true, |b| table.len() > b.len()) {
            best = Some(table);
        }
    }
    best.map(|cells| table_rows(cells, glyphs, settings))
}

/// Tables as cell lists, sorted top to bottom then left to right.
fn detect(rulings: &[Ruling], settings: &TableSettings) -> Vec<Vec<Cell>> {
    let (mut horizontal, mut vertical): (Vec<Ruling>, Vec<Ruling>) = rulings
        .iter()
        .copied()
        .filter(Ruling::is_finite)
        .partition(|r| r.orientation == Orientation::Horizontal);

    snap_edges(&mut horizontal, settings.snap_tolerance);
    snap_edges(&mut vertical, settings.snap_tolerance);
    let horizontal: Vec<Ruling> = join_edge_group(horizontal, settings.join_tolerance)
        .into_iter()
        .filter(|r| r.length() >= settings.edge_min_length)
        .collect();
    let vertical: Vec<Ruling> = join_edge_group(vertical, settings.join_tolerance)
        .into_iter()
        .filter(|r| r.length() >= settings.edge_min_length)
        .collect();

    let points = edges_to_intersections(&horizontal, &vertical, settings.intersection_tolerance);
    let cells = intersections_to_cells(&points);
    let mut tables = cells_to_tables(&cells);
    tables.sort_by(|a, b| {
        let (a_top, a_left) = bbox_origin(a);
        let (b_top, b_left) = bbox_origin(b);
        b_top.total_cmp(&a_top).then(a_left.total_cmp(&b_left))
    });
    tables
}

fn bbox_origin(cells: &[Cell]) -> (f32, f32) {
    let top = cells.iter().map(|c| c.top).fold(f32::MIN, f32::max);
    let left = cells.iter().map(|c| c.left).fold(f32::MAX, f32::min);
    (top, left)
}

/// Move parallel rulings within `tolerance` of each other onto their mean
/// position. Clusters chain: each ruling is compared with its neighbour.
fn snap_edges(edges: &mut [Ruling], tolerance: f32) {
    edges.sort_by(|a, b| a.position.total_cmp(&b.position));
    let mut i = 0;
    while i < edges.len() {
        let mut j = i + 1;
        while j < edges.len() && edges[j].position - edges[j - 1].position <= tolerance {
            j += 1;
        }
        let mean = edges[i..j].iter().map(|e| e.position).sum::<f32>() / (j - i) as f32;
        for e in &mut edges[i..j] {
            e.position = mean;
        }
        i = j;
    }
}

/// Merge collinear rulings that overlap or are at most `tolerance` apart.
fn join_edge_group(mut edges: Vec<Ruling>, tolerance: f32) -> Vec<Ruling> {
    edges.sort_by(|a, b| {
        a.position
            .total_cmp(&b.position)
            .then(a.start.total_cmp(&b.start))
    });
    let mut joined: Vec<Ruling> = Vec::with_capacity(edges.len());
    for edge in edges {
        match joined.last_mut() {
            Some(last) if last.position == edge.position && edge.start <= last.end + tolerance => {
                last.end = last.end.max(edge.end);
            }
            _ => joined.push(edge),
        }
    }
    joined
}

/// Crossing points, sorted top to bottom then left to right.
fn edges_to_intersections(
    horizontal: &[Ruling],
    vertical: &[Ruling],
    tolerance: f32,
) -> Vec<Intersection> {
    let mut points: Vec<Intersection> = Vec::new();
    for (vi, v) in vertical.iter().enumerate() {
        for (hi, h) in horizontal.iter().enumerate() {
            let crosses = h.position >= v.start - tolerance
                && h.position <= v.end + tolerance
                && v.position >= h.start - tolerance
                && v.position <= h.end + tolerance;
            if !crosses {
                continue;
            }
            match points
                .iter_mut()
                .find(|p| p.x == v.position && p.y == h.position)
            {
                Some(p) => {
                    if !p.horizontal.contains(&hi) {
                        p.horizontal.push(hi);
                    }
                    if !p.vertical.contains(&vi) {
                        p.vertical.push(vi);
                    }
                }
                None => points.push(Intersection {
                    x: v.position,
                    y: h.position,
                    horizontal: vec![hi],
                    vertical: vec![vi],
                }),
            }
        }
    }
    points.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));
    points
}

/// Two intersections are connected when one ruling runs through both.
fn connected(a: &Intersection, b: &Intersection) -> bool {
    if a.x == b.x && a.vertical.iter().any(|e| b.vertical.contains(e)) {
        return true;
    }
    a.y == b.y && a.horizontal.iter().any(|e| b.horizontal.contains(e))
}

/// The smallest cell hanging off each intersection as its top-left corner.
fn intersections_to_cells(points: &[Intersection]) -> Vec<Cell> {
    let mut cells = Vec::new();
    for (i, top_left) in points.iter().enumerate() {
        let rest = &points[i + 1..];
        // `points` is sorted, so both lists run nearest first.
        let below: Vec<&Intersection> = rest.iter().filter(|q| q.x == top_left.x).collect();
        let right: Vec<&Intersection> = rest.iter().filter(|q| q.y == top_left.y).collect();

        'search: for bottom_left in &below {
            if !connected(top_left, bottom_left) {
                continue;
            }
            for top_right in &right {
                if !connected(top_left, top_right) {
                    continue;
                }
                let corner = points
                    .iter()
                    .find(|p| p.x == top_right.x && p.y == bottom_left.y);
                if let Some(bottom_right) = corner {
                    if connected(bottom_right, top_right) && connected(bottom_right, bottom_left) {
                        cells.push(Cell {
                            left: top_left.x,
                            bottom: bottom_left.y,
                            right: top_right.x,
                            top: top_left.y,
                        });
                        break 'search;
                    }
                }
            }
        }
    }
    cells
}

/// Group cells sharing a corner. A lone cell is a box, not a table.
fn cells_to_tables(cells: &[Cell]) -> Vec<Vec<Cell>> {
    fn root(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut parent: Vec<usize> = (0..cells.len()).collect();
    for i in 0..cells.len() {
        let corners = cells[i].corners();
        for j in (i + 1)..cells.len() {
            if cells[j].corners().iter().any(|c| corners.contains(c)) {
                let (a, b) = (root(&mut parent, i), root(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut groups: BTreeMap<usize, Vec<Cell>> = BTreeMap::new();
    for (i, cell) in cells.iter().enumerate() {
        let r = root(&mut parent, i);
        groups.entry(r).or_default().push(*cell);
    }
    groups.into_values().filter(|g| g.len() > 1).collect()
}

/// Rows top to bottom over the table's distinct column starts; a row with
/// no cell at a column gets `""`.
fn table_rows(cells: &[Cell], glyphs: &[Glyph], settings: &TableSettings) -> Vec<Vec<String>> {
    let mut tops: Vec<f32> = cells.iter().map(|c| c.top).collect();
    tops.sort_by(|a, b| b.total_cmp(a));
    tops.dedup();
    let mut lefts: Vec<f32> = cells.iter().map(|c| c.left).collect();
    lefts.sort_by(|a, b| a.total_cmp(b));
    lefts.dedup();

    tops.iter()
        .map(|&top| {
            lefts
                .iter()
                .map(|&left| {
                    cells
                        .iter()
                        .find(|c| c.top == top && c.left == left)
                        .map(|c| cell_text(c, glyphs, settings))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect()
}

/// Text of the glyphs centred inside `cell`, lines joined with `\n`.
fn cell_text(cell: &Cell, glyphs: &[Glyph], settings: &TableSettings) -> String {
    let mut inside: Vec<&Glyph> = glyphs
        .iter()
        .filter(|g| !g.ch.is_control() && g.height() > 0.0)
        .filter(|g| cell.contains(g.center_x(), g.center_y()))
        .collect();
    inside.sort_by(|a, b| {
        b.center_y()
            .total_cmp(&a.center_y())
            .then(a.left.total_cmp(&b.left))
    });

    let mut lines: Vec<Vec<&Glyph>> = Vec::new();
    let mut anchor_y = f32::NAN;
    for g in inside {
        match lines.last_mut() {
            Some(line) if (anchor_y - g.center_y()).abs() <= settings.text_y_tolerance => {
                line.push(g)
            }
            _ => {
                anchor_y = g.center_y();
                lines.push(vec![g]);
            }
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.left.total_cmp(&b.left));
            let mut text = String::new();
            let mut prev_right: Option<f32> = None;
            let mut pending_space = false;
            for g in line {
                if g.ch.is_whitespace() {
                    pending_space = true;
                    continue;
                }
                if let Some(right) = prev_right {
                    if pending_space || g.left - right > settings.text_x_tolerance {
                        text.push(' ');
                    }
                }
                text.push(g.ch);
                prev_right = Some(g.right);
                pending_space = false;
            }
            text
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
