use super::{Span, StyleSpan};

fn intervals_overlap(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> bool {
    a_start.max(b_start) < a_end.min(b_end)
}

/// A line is handwritten when any of its spans shares at least one character
/// with a handwritten style span.
pub fn is_line_handwritten(line_spans: &[Span], style_spans: &[StyleSpan]) -> bool {
    line_spans.iter().any(|span| {
        style_spans
            .iter()
            .filter(|style| style.is_handwritten)
            .any(|style| {
                intervals_overlap(
                    span.offset,
                    span.end(),
                    style.offset,
                    style.offset.saturating_add(style.length),
                )
            })
    })
}
