use anyhow::Result;
use serde::Serialize;

use crate::analysis::PageRegions;
use crate::fit::{FitConfig, FitResult, FontMetrics, fit_region};
use crate::reconcile::MergedRegion;

#[derive(Debug, Clone, Serialize)]
pub struct PageOutput {
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    pub regions: Vec<MergedRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fits: Option<Vec<FitResult>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutput {
    pub pages: Vec<PageOutput>,
}

pub fn fit_regions(
    regions: &[MergedRegion],
    config: &FitConfig,
    font: Option<&FontMetrics>,
) -> Result<Vec<FitResult>> {
    regions
        .iter()
        .map(|region| fit_region(region, config, font))
        .collect()
}

pub fn build_output(
    pages: Vec<PageRegions>,
    fit_config: Option<&FitConfig>,
    font: Option<&FontMetrics>,
) -> Result<ReconcileOutput> {
    let pages = pages
        .into_iter()
        .map(|page| {
            let fits = match fit_config {
                Some(config) => Some(fit_regions(&page.regions, config, font)?),
                None => None,
            };
            Ok(PageOutput {
                page_index: page.page_index,
                width: page.width,
                height: page.height,
                regions: page.regions,
                fits,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ReconcileOutput { pages })
}
