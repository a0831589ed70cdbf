use super::geom::{angle_from_polygon, median, snap_to_0_or_90, union_bbox};
use super::group::LineGroup;
use super::script::ScriptKind;
use super::{MergedRegion, ReconcileConfig, StructuredLine};

pub fn merge_group(
    lines: &[StructuredLine],
    group: &LineGroup,
    config: &ReconcileConfig,
) -> MergedRegion {
    let members: Vec<&StructuredLine> = group.members.iter().map(|idx| &lines[*idx]).collect();

    let joined = members
        .iter()
        .map(|line| line.authoritative_text())
        .collect::<Vec<_>>()
        .join("\n");
    let display_text = ScriptKind::detect(&joined).normalize(&joined);

    let bbox = members
        .iter()
        .map(|line| line.bbox)
        .reduce(|acc, bbox| union_bbox(&acc, &bbox))
        .unwrap_or_default();
    let polygon = match members.as_slice() {
        [single] => single.polygon.clone(),
        _ => bbox.to_polygon(),
    };

    let angles: Vec<f32> = members
        .iter()
        .filter_map(|line| angle_from_polygon(&line.polygon))
        .collect();
    let orientation_deg = match median(&angles) {
        Some(angle) if config.snap_orientation => snap_to_0_or_90(angle),
        Some(angle) => angle,
        None => 0.0,
    };

    MergedRegion {
        display_text,
        bbox,
        polygon,
        orientation_deg,
        is_handwritten: members.iter().any(|line| line.is_handwritten),
        source: group.source,
    }
}
