use serde::Serialize;
use tracing::debug;

use super::geom::{bbox_from_polygon, edges_aligned, overlaps};
use super::{ReconcileConfig, StructuredLine, TableCellGeometry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupSource {
    TableCell {
        row_index: usize,
        column_index: usize,
    },
    Cluster,
}

/// Indices into the page's structured lines, in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineGroup {
    pub source: GroupSource,
    pub members: Vec<usize>,
}

/// Lines already claimed by a group on this page.
struct ConsumedLines {
    used: Vec<bool>,
}

impl ConsumedLines {
    fn new(len: usize) -> Self {
        Self {
            used: vec![false; len],
        }
    }

    fn claim(&mut self, idx: usize) -> bool {
        if self.used[idx] {
            return false;
        }
        self.used[idx] = true;
        true
    }

    fn into_unclaimed(self) -> Vec<usize> {
        self.used
            .into_iter()
            .enumerate()
            .filter_map(|(idx, used)| if used { None } else { Some(idx) })
            .collect()
    }
}

/// Cell groups first (row-major, whatever order the cells arrive in), then
/// adjacency clusters over whatever the cells left behind. Every line ends up
/// in exactly one group.
pub fn group_lines(
    lines: &[StructuredLine],
    cells: &[TableCellGeometry],
    config: &ReconcileConfig,
) -> Vec<LineGroup> {
    let mut consumed = ConsumedLines::new(lines.len());
    let mut groups = Vec::new();

    let mut ordered: Vec<&TableCellGeometry> = cells.iter().collect();
    ordered.sort_by_key(|cell| (cell.row_index, cell.column_index));

    for cell in ordered {
        let cell_bbox = bbox_from_polygon(&cell.polygon);
        let members: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| overlaps(&line.bbox, &cell_bbox))
            .map(|(idx, _)| idx)
            .filter(|idx| consumed.claim(*idx))
            .collect();
        if !members.is_empty() {
            groups.push(LineGroup {
                source: GroupSource::TableCell {
                    row_index: cell.row_index,
                    column_index: cell.column_index,
                },
                members,
            });
        }
    }
    let cell_groups = groups.len();

    let leftovers = consumed.into_unclaimed();
    groups.extend(cluster_lines(
        lines,
        leftovers,
        config.vertical_gap,
        config.horizontal_align,
    ));
    debug!(
        "grouped {} lines into {} cell groups and {} clusters",
        lines.len(),
        cell_groups,
        groups.len() - cell_groups
    );
    groups
}

/// Walks `candidates` top to bottom, extending the open cluster while the
/// next line sits within `vertical_gap` below the previous one and shares a
/// left, right or center edge with it within `horizontal_align`. Lines whose
/// box has no area are appended afterwards as single-line clusters.
pub fn cluster_lines(
    lines: &[StructuredLine],
    candidates: Vec<usize>,
    vertical_gap: f32,
    horizontal_align: f32,
) -> Vec<LineGroup> {
    let (mut candidates, detached): (Vec<usize>, Vec<usize>) = candidates
        .into_iter()
        .partition(|idx| lines[*idx].bbox.area() > 0.0);
    candidates.sort_by(|a, b| {
        let (a, b) = (&lines[*a].bbox, &lines[*b].bbox);
        a.min_y.total_cmp(&b.min_y).then(a.min_x.total_cmp(&b.min_x))
    });

    let mut clusters: Vec<LineGroup> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    for idx in candidates {
        let line = &lines[idx];
        let joins = match current.last() {
            Some(&prev_idx) => {
                let prev = &lines[prev_idx];
                line.bbox.min_y - prev.bbox.max_y < vertical_gap
                    && edges_aligned(&prev.bbox, &line.bbox, horizontal_align)
            }
            None => false,
        };
        if !joins && !current.is_empty() {
            clusters.push(LineGroup {
                source: GroupSource::Cluster,
                members: std::mem::take(&mut current),
            });
        }
        current.push(idx);
    }
    if !current.is_empty() {
        clusters.push(LineGroup {
            source: GroupSource::Cluster,
            members: current,
        });
    }
    clusters.extend(detached.into_iter().map(|idx| LineGroup {
        source: GroupSource::Cluster,
        members: vec![idx],
    }));
    clusters
}
