use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub mod analysis;
pub mod fit;
pub mod logging;
pub mod output;
pub mod reconcile;
pub mod render;
pub mod server;
pub mod settings;
#[cfg(test)]
mod test_util;

use analysis::{DocumentAnalyzer, DocumentInput, FileAnalyzer, HttpAnalyzer};
use fit::ResolvedFont;
use output::ReconcileOutput;
use render::OverlayStyle;

const ENDPOINT_ENV: &str = "DOCUMENT_INTELLIGENCE_ENDPOINT";
const KEY_ENV: &str = "DOCUMENT_INTELLIGENCE_KEY";
const FALLBACK_FONT_FAMILIES: &[&str] = &[
    "Noto Sans CJK JP",
    "Noto Sans JP",
    "Hiragino Sans",
    "Yu Gothic",
    "Arial",
];

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub layout_path: Option<String>,
    pub read_path: Option<String>,
    pub data_path: Option<String>,
    pub key: Option<String>,
    pub endpoint: Option<String>,
    pub fit: bool,
    pub render_path: Option<String>,
    pub debug_bbox_path: Option<String>,
    pub settings_path: Option<String>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let wants_fit = config.fit || config.render_path.is_some();
    if wants_fit {
        // a bad font range fails before any analysis request is made
        settings.fit.validate()?;
    }

    let document = load_document(config.data_path.as_deref())?;
    let analyzer = build_analyzer(&config, &settings, document.is_some())?;
    let document = document.unwrap_or_else(|| DocumentInput::new(Vec::new(), "application/octet-stream"));

    let timeout = Duration::from_secs(settings.service_timeout_secs);
    let (layout, read) = analysis::analyze_pair(analyzer.as_ref(), document.clone(), timeout).await?;
    let pages = analysis::reconcile_document(
        &layout,
        &read,
        settings.reconcile,
        settings.service_pdf_dpi,
    )
    .await?;

    let font = if wants_fit {
        resolve_overlay_font(&settings)
    } else {
        None
    };
    let fit_config = wants_fit.then_some(&settings.fit);
    let output = output::build_output(
        pages,
        fit_config,
        font.as_ref().map(|resolved| &resolved.metrics),
    )?;

    if let Some(path) = config.render_path.as_deref() {
        write_overlay(path, &document, &output, &settings, font)?;
    }
    if let Some(path) = config.debug_bbox_path.as_deref() {
        write_debug_bbox(path, &document, &output)?;
    }

    let rendered = if config.fit {
        serde_json::to_string_pretty(&output)?
    } else {
        // fits computed only for the overlay stay out of the JSON
        let mut output = output;
        for page in &mut output.pages {
            page.fits = None;
        }
        serde_json::to_string_pretty(&output)?
    };
    Ok(rendered)
}

/// Overlay font from settings, falling back to common CJK-capable families.
/// Without a font, widths are estimated per character.
pub fn resolve_overlay_font(settings: &settings::Settings) -> Option<ResolvedFont> {
    let font_path = settings.overlay_font_path.as_deref().map(Path::new);
    match fit::resolve_font(
        font_path,
        settings.overlay_font_family.as_deref(),
        FALLBACK_FONT_FAMILIES,
    ) {
        Ok(resolved) => {
            info!("using font '{}'", resolved.family);
            Some(resolved)
        }
        Err(err) => {
            warn!("font unavailable, estimating text widths: {}", err);
            None
        }
    }
}

fn load_document(data_path: Option<&str>) -> Result<Option<DocumentInput>> {
    let Some(path) = data_path else {
        return Ok(None);
    };
    let path = PathBuf::from(path);
    let bytes = std::fs::read(&path)
        .with_context(|| format!("failed to read document: {}", path.display()))?;
    let mime = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .or_else(|| render::mime_from_path(&path))
        .unwrap_or("application/octet-stream")
        .to_string();
    info!("document {} ({}, {} bytes)", path.display(), mime, bytes.len());
    Ok(Some(DocumentInput::new(bytes, mime)))
}

fn build_analyzer(
    config: &Config,
    settings: &settings::Settings,
    has_document: bool,
) -> Result<Box<dyn DocumentAnalyzer>> {
    match (config.layout_path.as_deref(), config.read_path.as_deref()) {
        (Some(layout), Some(read)) => return Ok(Box::new(FileAnalyzer::new(layout, read))),
        (Some(_), None) | (None, Some(_)) => {
            return Err(anyhow!("--layout and --read must be given together"));
        }
        (None, None) => {}
    }
    if !has_document {
        return Err(anyhow!(
            "provide --data for analysis, or saved results via --layout and --read"
        ));
    }
    let endpoint = config
        .endpoint
        .clone()
        .or_else(|| settings.service_endpoint.clone())
        .or_else(|| std::env::var(ENDPOINT_ENV).ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("no analysis endpoint (use --endpoint or {})", ENDPOINT_ENV))?;
    let key = config
        .key
        .clone()
        .or_else(|| std::env::var(KEY_ENV).ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("no analysis key (use --key or {})", KEY_ENV))?;
    Ok(Box::new(service_analyzer(endpoint, key, settings)))
}

fn service_analyzer(endpoint: String, key: String, settings: &settings::Settings) -> HttpAnalyzer {
    HttpAnalyzer::new(endpoint, key)
        .with_models(
            settings.service_layout_model.clone(),
            settings.service_read_model.clone(),
        )
        .with_api_version(settings.service_api_version.clone())
        .with_poll_interval(Duration::from_millis(settings.service_poll_interval_ms))
}

fn image_size(document: &DocumentInput, what: &str) -> Result<(u32, u32)> {
    if !document.mime.starts_with("image/") {
        return Err(anyhow!(
            "{} requires an image passed via --data (got {})",
            what,
            document.mime
        ));
    }
    let image = image::load_from_memory(&document.bytes)
        .with_context(|| format!("failed to decode {} source image", what))?;
    Ok((image.width(), image.height()))
}

fn output_mime(path: &Path) -> &'static str {
    render::mime_from_path(path).unwrap_or("image/png")
}

fn write_overlay(
    path: &str,
    document: &DocumentInput,
    output: &ReconcileOutput,
    settings: &settings::Settings,
    font: Option<ResolvedFont>,
) -> Result<()> {
    let (width, height) = image_size(document, "--render")?;
    let Some(page) = output.pages.first() else {
        return Err(anyhow!("no pages to render"));
    };
    let fits = page
        .fits
        .as_deref()
        .ok_or_else(|| anyhow!("fit results missing for overlay"))?;
    let font_data = font.as_ref().map(|resolved| resolved.metrics.data().to_vec());
    let style = OverlayStyle {
        text_color: settings.overlay_text_color.clone(),
        handwritten_color: settings.overlay_handwritten_color.clone(),
        fill_color: settings.overlay_fill_color.clone(),
        font_family: font.as_ref().map(|resolved| resolved.family.clone()),
        font_metrics: font.map(|resolved| resolved.metrics),
    };
    let svg = render::render_overlay_svg(
        &document.bytes,
        &document.mime,
        width,
        height,
        &page.regions,
        fits,
        &settings.fit,
        &style,
    )?;
    write_rendered(path, &svg, font_data.as_deref())
}

fn write_debug_bbox(path: &str, document: &DocumentInput, output: &ReconcileOutput) -> Result<()> {
    let (width, height) = image_size(document, "--debug-bbox")?;
    let regions = output
        .pages
        .first()
        .map(|page| page.regions.as_slice())
        .unwrap_or_default();
    let svg = render::render_regions_svg(&document.bytes, &document.mime, width, height, regions)?;
    write_rendered(path, &svg, None)
}

fn write_rendered(path: &str, svg: &str, font_data: Option<&[u8]>) -> Result<()> {
    let path = Path::new(path);
    let bytes = render::render_svg_bytes(svg, output_mime(path), font_data)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("failed to write image: {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_results_need_both_paths() {
        let config = Config {
            layout_path: Some("layout.json".to_string()),
            ..Config::default()
        };
        let err = build_analyzer(&config, &settings::Settings::default(), false)
            .err()
            .expect("error");
        assert!(err.to_string().contains("must be given together"));
    }

    #[test]
    fn service_analysis_needs_a_document() {
        let err = build_analyzer(&Config::default(), &settings::Settings::default(), false)
            .err()
            .expect("error");
        assert!(err.to_string().contains("--data"));
    }

    #[test]
    fn explicit_endpoint_and_key_build_http_analyzer() {
        let config = Config {
            endpoint: Some("https://example.cognitiveservices.azure.com".to_string()),
            key: Some("secret".to_string()),
            ..Config::default()
        };
        assert!(build_analyzer(&config, &settings::Settings::default(), true).is_ok());
    }

    #[test]
    fn service_analyzer_polls_at_configured_interval() {
        let settings = settings::Settings {
            service_poll_interval_ms: 250,
            ..settings::Settings::default()
        };
        let analyzer = service_analyzer("https://example.test".to_string(), "key".to_string(), &settings);
        assert_eq!(analyzer.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn overlay_requires_image_input() {
        let document = DocumentInput::new(b"%PDF-1.7".to_vec(), "application/pdf");
        let err = image_size(&document, "--render").err().expect("error");
        assert!(err.to_string().contains("requires an image"));
    }

    #[test]
    fn output_mime_defaults_to_png() {
        assert_eq!(output_mime(Path::new("out.jpg")), "image/jpeg");
        assert_eq!(output_mime(Path::new("out")), "image/png");
    }
}
