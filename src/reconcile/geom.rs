use super::{BoundingBox, Point};

pub fn bbox_from_polygon(polygon: &[Point]) -> BoundingBox {
    let Some(first) = polygon.first() else {
        return BoundingBox::default();
    };
    polygon.iter().skip(1).fold(
        BoundingBox {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        },
        |acc, point| BoundingBox {
            min_x: acc.min_x.min(point.x),
            min_y: acc.min_y.min(point.y),
            max_x: acc.max_x.max(point.x),
            max_y: acc.max_y.max(point.y),
        },
    )
}

fn intersection_area(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let ix1 = a.min_x.max(b.min_x);
    let iy1 = a.min_y.max(b.min_y);
    let ix2 = a.max_x.min(b.max_x);
    let iy2 = a.max_y.min(b.max_y);
    if ix2 <= ix1 || iy2 <= iy1 {
        return 0.0;
    }
    (ix2 - ix1) * (iy2 - iy1)
}

/// Intersection over union. Zero when either box has no area.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let area_a = a.area();
    let area_b = b.area();
    if area_a <= 0.0 || area_b <= 0.0 {
        return 0.0;
    }
    let inter = intersection_area(a, b);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        return 0.0;
    }
    (inter / union).clamp(0.0, 1.0)
}

/// Strict overlap: boxes that only touch along an edge do not overlap.
pub fn overlaps(a: &BoundingBox, b: &BoundingBox) -> bool {
    intersection_area(a, b) > 0.0
}

pub fn union_bbox(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
    BoundingBox {
        min_x: a.min_x.min(b.min_x),
        min_y: a.min_y.min(b.min_y),
        max_x: a.max_x.max(b.max_x),
        max_y: a.max_y.max(b.max_y),
    }
}

pub(crate) fn normalize_angle(deg: f32) -> f32 {
    let reduced = deg.rem_euclid(180.0);
    if reduced >= 180.0 { 0.0 } else { reduced }
}

/// Direction of the first polygon edge in degrees, reduced into `[0, 180)`.
/// Only polygons with fewer than two points have no angle.
pub fn angle_from_polygon(polygon: &[Point]) -> Option<f32> {
    if polygon.len() < 2 {
        return None;
    }
    let dx = polygon[1].x - polygon[0].x;
    let dy = polygon[1].y - polygon[0].y;
    Some(normalize_angle(dy.atan2(dx).to_degrees()))
}

pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Snaps to whichever of 0 or 90 degrees is angularly closer; ties go to 0.
pub fn snap_to_0_or_90(angle_deg: f32) -> f32 {
    let deg = normalize_angle(angle_deg);
    let dist_0 = deg.min(180.0 - deg);
    let dist_90 = (90.0 - deg).abs();
    if dist_90 < dist_0 { 90.0 } else { 0.0 }
}

pub(crate) fn edges_aligned(a: &BoundingBox, b: &BoundingBox, threshold: f32) -> bool {
    let left = (a.min_x - b.min_x).abs() < threshold;
    let right = (a.max_x - b.max_x).abs() < threshold;
    let center = (a.center_x() - b.center_x()).abs() < threshold;
    left || right || center
}
