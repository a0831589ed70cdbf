mod geom;
mod group;
mod handwriting;
mod matcher;
mod merge;
mod script;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use geom::{
    angle_from_polygon, bbox_from_polygon, iou, median, overlaps, snap_to_0_or_90, union_bbox,
};
pub use group::{GroupSource, LineGroup, cluster_lines, group_lines};
pub use handwriting::is_line_handwritten;
pub use matcher::{cross_reference, matched_read_texts};
pub use merge::merge_group;
pub use script::{ScriptKind, is_cjk_char, is_script_cjk, normalize_cjk, normalize_latin};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

pub type Polygon = Vec<Point>;

/// Axis-aligned box in image pixels. Zero-area boxes overlap nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.max_x - self.min_x).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.max_y - self.min_y).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_x(&self) -> f32 {
        (self.min_x + self.max_x) / 2.0
    }

    pub fn center_y(&self) -> f32 {
        (self.min_y + self.max_y) / 2.0
    }

    pub fn to_polygon(&self) -> Polygon {
        vec![
            Point {
                x: self.min_x,
                y: self.min_y,
            },
            Point {
                x: self.max_x,
                y: self.min_y,
            },
            Point {
                x: self.max_x,
                y: self.max_y,
            },
            Point {
                x: self.min_x,
                y: self.max_y,
            },
        ]
    }
}

/// Character interval into the page's text stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

impl Span {
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }
}

/// A transcribed line from either analysis. Only layout lines carry spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    pub text: String,
    pub bbox: BoundingBox,
    pub polygon: Polygon,
    #[serde(default)]
    pub spans: Vec<Span>,
    pub page_index: usize,
}

impl RawLine {
    pub fn new(text: impl Into<String>, polygon: Polygon, page_index: usize) -> Self {
        let bbox = bbox_from_polygon(&polygon);
        Self {
            text: text.into(),
            bbox,
            polygon,
            spans: Vec::new(),
            page_index,
        }
    }

    pub fn with_spans(mut self, spans: Vec<Span>) -> Self {
        self.spans = spans;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSpan {
    pub offset: usize,
    pub length: usize,
    pub is_handwritten: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredLine {
    pub layout_text: String,
    pub matched_ocr_texts: Vec<String>,
    pub bbox: BoundingBox,
    pub polygon: Polygon,
    pub is_handwritten: bool,
    pub page_index: usize,
}

impl StructuredLine {
    /// Read transcriptions win over the layout transcription whenever any
    /// read line matched.
    pub fn authoritative_text(&self) -> String {
        if self.matched_ocr_texts.is_empty() {
            self.layout_text.clone()
        } else {
            self.matched_ocr_texts.join(" ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCellGeometry {
    pub row_index: usize,
    pub column_index: usize,
    pub polygon: Polygon,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRegion {
    pub display_text: String,
    pub bbox: BoundingBox,
    pub polygon: Polygon,
    pub orientation_deg: f32,
    pub is_handwritten: bool,
    pub source: GroupSource,
}

/// Everything the engine needs for one page, already adapted from the
/// analysis service's result shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInput {
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    pub layout_lines: Vec<RawLine>,
    pub read_lines: Vec<RawLine>,
    pub style_spans: Vec<StyleSpan>,
    pub table_cells: Vec<TableCellGeometry>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileConfig {
    pub iou_threshold: f32,
    pub vertical_gap: f32,
    pub horizontal_align: f32,
    pub snap_orientation: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.1,
            vertical_gap: 40.0,
            horizontal_align: 30.0,
            snap_orientation: true,
        }
    }
}

pub fn reconcile_page(page: &PageInput, config: &ReconcileConfig) -> Vec<MergedRegion> {
    let lines = cross_reference(
        &page.layout_lines,
        &page.read_lines,
        &page.style_spans,
        config.iou_threshold,
    );
    let groups = group_lines(&lines, &page.table_cells, config);
    let regions: Vec<MergedRegion> = groups
        .iter()
        .map(|group| merge_group(&lines, group, config))
        .collect();
    debug!(
        "page {}: {} layout lines, {} read lines, {} regions",
        page.page_index,
        page.layout_lines.len(),
        page.read_lines.len(),
        regions.len()
    );
    regions
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub(crate) fn rect(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Polygon {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
        .to_polygon()
    }

    pub(crate) fn structured(text: &str, polygon: Polygon) -> StructuredLine {
        StructuredLine {
            layout_text: text.to_string(),
            matched_ocr_texts: Vec::new(),
            bbox: bbox_from_polygon(&polygon),
            polygon,
            is_handwritten: false,
            page_index: 0,
        }
    }
}
