mod file;
mod http;
mod model;
mod retry;

use anyhow::{Context, Result, anyhow};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::reconcile::{MergedRegion, PageInput, ReconcileConfig, reconcile_page};

pub use file::FileAnalyzer;
pub use http::{DEFAULT_API_VERSION, DEFAULT_LAYOUT_MODEL, DEFAULT_READ_MODEL, HttpAnalyzer};
pub use model::{
    AnalyzeResult, AnalyzedCell, AnalyzedLine, AnalyzedPage, AnalyzedSpan, AnalyzedStyle,
    AnalyzedTable, BoundingRegion, page_inputs, parse_analyze_result, parse_analyze_result_str,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Layout,
    Read,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Layout => "layout",
            AnalysisKind::Read => "read",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub bytes: Arc<Vec<u8>>,
    pub mime: String,
}

impl DocumentInput {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes: Arc::new(bytes),
            mime: mime.into(),
        }
    }
}

pub type AnalyzeFuture = Pin<Box<dyn Future<Output = Result<AnalyzeResult>> + Send>>;

pub trait DocumentAnalyzer: Send + Sync {
    fn analyze(&self, kind: AnalysisKind, document: DocumentInput) -> AnalyzeFuture;
}

async fn with_timeout(kind: AnalysisKind, future: AnalyzeFuture, timeout: Duration) -> Result<AnalyzeResult> {
    tokio::time::timeout(timeout, future).await.map_err(|_| {
        anyhow!(
            "{} analysis timed out after {:.0}s",
            kind.as_str(),
            timeout.as_secs_f32()
        )
    })?
}

/// Runs both analyses concurrently and returns only once both have finished.
pub async fn analyze_pair<A>(
    analyzer: &A,
    document: DocumentInput,
    timeout: Duration,
) -> Result<(AnalyzeResult, AnalyzeResult)>
where
    A: DocumentAnalyzer + ?Sized,
{
    let layout = with_timeout(
        AnalysisKind::Layout,
        analyzer.analyze(AnalysisKind::Layout, document.clone()),
        timeout,
    );
    let read = with_timeout(
        AnalysisKind::Read,
        analyzer.analyze(AnalysisKind::Read, document),
        timeout,
    );
    let (layout, read) = tokio::try_join!(layout, read)?;
    info!(
        "analysis finished: {} layout pages, {} read pages",
        layout.pages.len(),
        read.pages.len()
    );
    Ok((layout, read))
}

#[derive(Debug, Clone, Serialize)]
pub struct PageRegions {
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    pub regions: Vec<MergedRegion>,
}

/// Reconciles every page on its own blocking task; results keep page order.
pub async fn reconcile_pages(pages: Vec<PageInput>, config: ReconcileConfig) -> Result<Vec<PageRegions>> {
    let tasks = pages.into_iter().map(|page| {
        tokio::task::spawn_blocking(move || PageRegions {
            page_index: page.page_index,
            width: page.width,
            height: page.height,
            regions: reconcile_page(&page, &config),
        })
    });
    try_join_all(tasks)
        .await
        .with_context(|| "page reconciliation task failed")
}

pub async fn reconcile_document(
    layout: &AnalyzeResult,
    read: &AnalyzeResult,
    config: ReconcileConfig,
    dpi: f32,
) -> Result<Vec<PageRegions>> {
    reconcile_pages(page_inputs(layout, read, dpi), config).await
}
