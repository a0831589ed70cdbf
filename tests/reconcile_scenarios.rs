use ocr_reconcile::analysis::{PageRegions, reconcile_pages};
use ocr_reconcile::fit::FitConfig;
use ocr_reconcile::output::build_output;
use ocr_reconcile::reconcile::{
    BoundingBox, GroupSource, MergedRegion, PageInput, Polygon, RawLine, ReconcileConfig, Span,
    StyleSpan, TableCellGeometry, reconcile_page,
};
use serde_json::json;

fn rect(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Polygon {
    BoundingBox {
        min_x,
        min_y,
        max_x,
        max_y,
    }
    .to_polygon()
}

fn summarize(regions: &[MergedRegion]) -> String {
    regions
        .iter()
        .map(|region| {
            let source = match region.source {
                GroupSource::TableCell {
                    row_index,
                    column_index,
                } => format!("cell({},{})", row_index, column_index),
                GroupSource::Cluster => "cluster".to_string(),
            };
            let bbox = region.bbox;
            format!(
                "{} | {} | {},{},{},{} | {} | hw={}",
                source,
                region.display_text,
                bbox.min_x,
                bbox.min_y,
                bbox.max_x,
                bbox.max_y,
                region.orientation_deg,
                region.is_handwritten
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn inspection_sheet() -> PageInput {
    PageInput {
        page_index: 0,
        width: 600.0,
        height: 400.0,
        layout_lines: vec![
            RawLine::new("店舗名", rect(10.0, 10.0, 110.0, 40.0), 0)
                .with_spans(vec![Span { offset: 0, length: 3 }]),
            RawLine::new("記入者", rect(10.0, 60.0, 110.0, 90.0), 0)
                .with_spans(vec![Span { offset: 4, length: 3 }]),
            RawLine::new("備考", rect(300.0, 10.0, 400.0, 40.0), 0)
                .with_spans(vec![Span { offset: 8, length: 2 }]),
        ],
        read_lines: vec![
            RawLine::new("店舗名称", rect(12.0, 12.0, 108.0, 38.0), 0),
            RawLine::new("記入者", rect(10.0, 60.0, 110.0, 90.0), 0),
        ],
        style_spans: vec![StyleSpan {
            offset: 4,
            length: 3,
            is_handwritten: true,
        }],
        table_cells: vec![
            TableCellGeometry {
                row_index: 0,
                column_index: 0,
                polygon: rect(0.0, 0.0, 150.0, 50.0),
            },
            TableCellGeometry {
                row_index: 1,
                column_index: 0,
                polygon: rect(0.0, 50.0, 150.0, 100.0),
            },
        ],
    }
}

#[test]
fn table_cells_group_before_clusters() {
    let regions = reconcile_page(&inspection_sheet(), &ReconcileConfig::default());
    insta::assert_snapshot!(summarize(&regions), @r"
    cell(0,0) | 店舗名称 | 10,10,110,40 | 0 | hw=false
    cell(1,0) | 記入者 | 10,60,110,90 | 0 | hw=true
    cluster | 備考 | 300,10,400,40 | 0 | hw=false
    ");
}

#[test]
fn lines_outside_tables_cluster_by_proximity() {
    let page = PageInput {
        page_index: 0,
        width: 600.0,
        height: 400.0,
        layout_lines: vec![
            RawLine::new("Hand washing", rect(20.0, 100.0, 220.0, 130.0), 0),
            RawLine::new("station", rect(20.0, 140.0, 180.0, 170.0), 0),
            RawLine::new("Inspector", rect(400.0, 300.0, 550.0, 330.0), 0),
        ],
        read_lines: vec![RawLine::new(
            "Inspector: K. Sato",
            rect(400.0, 300.0, 550.0, 330.0),
            0,
        )],
        ..PageInput::default()
    };
    let regions = reconcile_page(&page, &ReconcileConfig::default());
    insta::assert_snapshot!(summarize(&regions), @r"
    cluster | Hand washing station | 20,100,220,170 | 0 | hw=false
    cluster | Inspector: K. Sato | 400,300,550,330 | 0 | hw=false
    ");
}

#[tokio::test]
async fn fitted_output_reports_font_sizes() {
    let pages: Vec<PageRegions> = reconcile_pages(vec![inspection_sheet()], ReconcileConfig::default())
        .await
        .expect("pages");
    let output = build_output(pages, Some(&FitConfig::default()), None).expect("output");
    let fits = output.pages[0].fits.as_ref().expect("fits");
    let summary = fits
        .iter()
        .map(|fit| format!("{} {:?}", fit.font_size, fit.lines))
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(summary, @r#"
    24 ["店舗名称"]
    24 ["記入者"]
    24 ["備考"]
    "#);
}

#[tokio::test]
async fn saved_results_run_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let layout_path = dir.path().join("layout.json");
    let read_path = dir.path().join("read.json");
    let layout = json!({
        "status": "succeeded",
        "analyzeResult": {
            "pages": [{
                "pageNumber": 1,
                "width": 600,
                "height": 400,
                "unit": "pixel",
                "lines": [
                    {"content": "店舗名", "polygon": [10, 10, 110, 10, 110, 40, 10, 40], "spans": [{"offset": 0, "length": 3}]},
                    {"content": "記入者", "polygon": [10, 60, 110, 60, 110, 90, 10, 90], "spans": [{"offset": 4, "length": 3}]}
                ]
            }],
            "tables": [{
                "rowCount": 1,
                "columnCount": 1,
                "cells": [{"rowIndex": 0, "columnIndex": 0, "boundingRegions": [{"pageNumber": 1, "polygon": [0, 0, 150, 0, 150, 50, 0, 50]}]}]
            }],
            "styles": [{"isHandwritten": true, "spans": [{"offset": 4, "length": 3}]}]
        }
    });
    let read = json!({
        "pages": [{
            "pageNumber": 1,
            "lines": [{"content": "店舗名称", "polygon": [12, 12, 108, 12, 108, 38, 12, 38]}]
        }]
    });
    std::fs::write(&layout_path, layout.to_string()).expect("write layout");
    std::fs::write(&read_path, read.to_string()).expect("write read");

    let config = ocr_reconcile::Config {
        layout_path: Some(layout_path.display().to_string()),
        read_path: Some(read_path.display().to_string()),
        ..ocr_reconcile::Config::default()
    };
    let rendered = ocr_reconcile::run(config).await.expect("run");
    let value: serde_json::Value = serde_json::from_str(&rendered).expect("json");
    let page = &value["pages"][0];
    assert_eq!(page["page_index"], 0);
    assert!(page.get("fits").is_none());
    let regions = page["regions"].as_array().expect("regions");
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0]["display_text"], "店舗名称");
    assert_eq!(regions[0]["source"]["kind"], "table_cell");
    assert_eq!(regions[1]["display_text"], "記入者");
    assert_eq!(regions[1]["source"]["kind"], "cluster");
    assert_eq!(regions[1]["is_handwritten"], true);
}
