use tracing::debug;

use super::geom::iou;
use super::handwriting::is_line_handwritten;
use super::{RawLine, StructuredLine, StyleSpan};

/// Read-line texts whose boxes overlap `line` above `threshold`, in read order.
/// Blank transcriptions never count as a match.
pub fn matched_read_texts(line: &RawLine, read_lines: &[RawLine], threshold: f32) -> Vec<String> {
    read_lines
        .iter()
        .filter(|read| iou(&line.bbox, &read.bbox) > threshold)
        .map(|read| read.text.trim())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}

/// One structured line per layout line, in layout order.
pub fn cross_reference(
    layout_lines: &[RawLine],
    read_lines: &[RawLine],
    style_spans: &[StyleSpan],
    threshold: f32,
) -> Vec<StructuredLine> {
    let mut matched = 0usize;
    let lines: Vec<StructuredLine> = layout_lines
        .iter()
        .map(|line| {
            let matched_ocr_texts = matched_read_texts(line, read_lines, threshold);
            if !matched_ocr_texts.is_empty() {
                matched += 1;
            }
            StructuredLine {
                layout_text: line.text.clone(),
                matched_ocr_texts,
                bbox: line.bbox,
                polygon: line.polygon.clone(),
                is_handwritten: is_line_handwritten(&line.spans, style_spans),
                page_index: line.page_index,
            }
        })
        .collect();
    debug!(
        "cross-referenced {} layout lines, {} matched read text",
        lines.len(),
        matched
    );
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Span;
    use crate::reconcile::test_support::rect;

    #[test]
    fn read_text_wins_over_layout_text() {
        let layout = vec![RawLine::new("ABC", rect(0.0, 0.0, 100.0, 20.0), 0)];
        // overlap 100x20 of union 200x20 -> 0.5
        let read = vec![RawLine::new("XYZ", rect(0.0, 0.0, 200.0, 20.0), 0)];
        let lines = cross_reference(&layout, &read, &[], 0.1);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].layout_text, "ABC");
        assert_eq!(lines[0].matched_ocr_texts, vec!["XYZ"]);
        assert_eq!(lines[0].authoritative_text(), "XYZ");
    }

    #[test]
    fn falls_back_to_layout_text_below_threshold() {
        let layout = vec![RawLine::new("ABC", rect(0.0, 0.0, 100.0, 20.0), 0)];
        let read = vec![
            RawLine::new("far", rect(500.0, 500.0, 600.0, 520.0), 0),
            RawLine::new("sliver", rect(95.0, 0.0, 300.0, 20.0), 0),
        ];
        let lines = cross_reference(&layout, &read, &[], 0.1);
        assert!(lines[0].matched_ocr_texts.is_empty());
        assert_eq!(lines[0].authoritative_text(), "ABC");
    }

    #[test]
    fn multiple_matches_keep_read_order() {
        let layout = vec![RawLine::new("Store name", rect(0.0, 0.0, 200.0, 20.0), 0)];
        let read = vec![
            RawLine::new("name", rect(100.0, 0.0, 200.0, 20.0), 0),
            RawLine::new("Store", rect(0.0, 0.0, 100.0, 20.0), 0),
        ];
        let lines = cross_reference(&layout, &read, &[], 0.1);
        assert_eq!(lines[0].authoritative_text(), "name Store");
    }

    #[test]
    fn output_preserves_layout_order_and_handwriting() {
        let layout = vec![
            RawLine::new("first", rect(0.0, 0.0, 50.0, 10.0), 0)
                .with_spans(vec![Span { offset: 0, length: 5 }]),
            RawLine::new("second", rect(0.0, 20.0, 50.0, 30.0), 0)
                .with_spans(vec![Span { offset: 6, length: 6 }]),
        ];
        let styles = [StyleSpan {
            offset: 6,
            length: 6,
            is_handwritten: true,
        }];
        let lines = cross_reference(&layout, &[], &styles, 0.1);
        assert_eq!(lines[0].layout_text, "first");
        assert!(!lines[0].is_handwritten);
        assert_eq!(lines[1].layout_text, "second");
        assert!(lines[1].is_handwritten);
    }
}
