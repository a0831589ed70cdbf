use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::reconcile::{PageInput, Point, Polygon, RawLine, Span, StyleSpan, TableCellGeometry};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeResult {
    pub content: String,
    pub pages: Vec<AnalyzedPage>,
    pub tables: Vec<AnalyzedTable>,
    pub styles: Vec<AnalyzedStyle>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedPage {
    pub page_number: usize,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub unit: Option<String>,
    pub lines: Vec<AnalyzedLine>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedLine {
    pub content: String,
    pub polygon: Vec<f32>,
    pub spans: Vec<AnalyzedSpan>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedSpan {
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedTable {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<AnalyzedCell>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedCell {
    pub row_index: usize,
    pub column_index: usize,
    pub content: String,
    pub bounding_regions: Vec<BoundingRegion>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoundingRegion {
    pub page_number: usize,
    pub polygon: Vec<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedStyle {
    pub is_handwritten: Option<bool>,
    pub confidence: Option<f32>,
    pub spans: Vec<AnalyzedSpan>,
}

/// Accepts either a bare analyze result or the operation envelope that wraps
/// it under `analyzeResult`.
pub fn parse_analyze_result(value: serde_json::Value) -> Result<AnalyzeResult> {
    let inner = match value {
        serde_json::Value::Object(mut map) if map.contains_key("analyzeResult") => map
            .remove("analyzeResult")
            .unwrap_or(serde_json::Value::Null),
        other => other,
    };
    serde_json::from_value(inner).with_context(|| "failed to parse analyze result")
}

pub fn parse_analyze_result_str(text: &str) -> Result<AnalyzeResult> {
    let value: serde_json::Value =
        serde_json::from_str(text).with_context(|| "analyze result is not valid JSON")?;
    parse_analyze_result(value)
}

fn unit_scale(unit: Option<&str>, dpi: f32) -> f32 {
    match unit {
        Some(unit) if unit.eq_ignore_ascii_case("inch") => dpi,
        _ => 1.0,
    }
}

fn polygon_from_flat(flat: &[f32], scale: f32) -> Polygon {
    flat.chunks_exact(2)
        .map(|pair| Point {
            x: pair[0] * scale,
            y: pair[1] * scale,
        })
        .collect()
}

fn page_index(page_number: usize) -> usize {
    page_number.saturating_sub(1)
}

fn to_raw_lines(page: &AnalyzedPage, scale: f32, keep_spans: bool) -> Vec<RawLine> {
    page.lines
        .iter()
        .map(|line| {
            let raw = RawLine::new(
                line.content.clone(),
                polygon_from_flat(&line.polygon, scale),
                page_index(page.page_number),
            );
            if keep_spans {
                raw.with_spans(
                    line.spans
                        .iter()
                        .map(|span| Span {
                            offset: span.offset,
                            length: span.length,
                        })
                        .collect(),
                )
            } else {
                raw
            }
        })
        .collect()
}

fn handwritten_spans(styles: &[AnalyzedStyle]) -> Vec<StyleSpan> {
    styles
        .iter()
        .filter(|style| style.is_handwritten == Some(true))
        .flat_map(|style| {
            style.spans.iter().map(|span| StyleSpan {
                offset: span.offset,
                length: span.length,
                is_handwritten: true,
            })
        })
        .collect()
}

fn table_cells_for_page(tables: &[AnalyzedTable], page_number: usize, scale: f32) -> Vec<TableCellGeometry> {
    tables
        .iter()
        .flat_map(|table| table.cells.iter())
        .filter_map(|cell| {
            let region = cell.bounding_regions.first()?;
            if region.page_number != page_number {
                return None;
            }
            Some(TableCellGeometry {
                row_index: cell.row_index,
                column_index: cell.column_index,
                polygon: polygon_from_flat(&region.polygon, scale),
            })
        })
        .collect()
}

/// Pairs the layout and read results page by page. Style spans index the
/// layout result's content stream, so every page receives the full handwritten
/// span list.
pub fn page_inputs(layout: &AnalyzeResult, read: &AnalyzeResult, dpi: f32) -> Vec<PageInput> {
    let page_numbers: BTreeSet<usize> = layout
        .pages
        .iter()
        .chain(read.pages.iter())
        .map(|page| page.page_number)
        .collect();
    let style_spans = handwritten_spans(&layout.styles);

    page_numbers
        .into_iter()
        .map(|page_number| {
            let layout_page = layout.pages.iter().find(|page| page.page_number == page_number);
            let read_page = read.pages.iter().find(|page| page.page_number == page_number);
            let reference = layout_page.or(read_page);
            let scale = unit_scale(reference.and_then(|page| page.unit.as_deref()), dpi);
            let width = reference.and_then(|page| page.width).unwrap_or(0.0) * scale;
            let height = reference.and_then(|page| page.height).unwrap_or(0.0) * scale;
            PageInput {
                page_index: page_index(page_number),
                width,
                height,
                layout_lines: layout_page
                    .map(|page| to_raw_lines(page, scale, true))
                    .unwrap_or_default(),
                read_lines: read_page
                    .map(|page| to_raw_lines(page, scale, false))
                    .unwrap_or_default(),
                style_spans: style_spans.clone(),
                table_cells: table_cells_for_page(&layout.tables, page_number, scale),
            }
        })
        .collect()
}
