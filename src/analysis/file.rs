use anyhow::{Context, Result};
use std::path::PathBuf;

use super::model::parse_analyze_result_str;
use super::{AnalysisKind, AnalyzeFuture, DocumentAnalyzer, DocumentInput};

/// Serves previously saved analyze results instead of calling the service.
#[derive(Debug, Clone)]
pub struct FileAnalyzer {
    layout_path: PathBuf,
    read_path: PathBuf,
}

impl FileAnalyzer {
    pub fn new(layout_path: impl Into<PathBuf>, read_path: impl Into<PathBuf>) -> Self {
        Self {
            layout_path: layout_path.into(),
            read_path: read_path.into(),
        }
    }
}

impl DocumentAnalyzer for FileAnalyzer {
    fn analyze(&self, kind: AnalysisKind, _document: DocumentInput) -> AnalyzeFuture {
        let path = match kind {
            AnalysisKind::Layout => self.layout_path.clone(),
            AnalysisKind::Read => self.read_path.clone(),
        };
        Box::pin(async move {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {} result: {}", kind.as_str(), path.display()))?;
            parse_analyze_result_str(&text)
                .with_context(|| format!("invalid {} result: {}", kind.as_str(), path.display()))
        })
    }
}
