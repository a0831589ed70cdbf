use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::{DEFAULT_API_VERSION, DEFAULT_LAYOUT_MODEL, DEFAULT_READ_MODEL};
use crate::fit::FitConfig;
use crate::reconcile::ReconcileConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub reconcile: ReconcileConfig,
    pub fit: FitConfig,
    pub overlay_text_color: String,
    pub overlay_handwritten_color: String,
    pub overlay_fill_color: String,
    pub overlay_font_family: Option<String>,
    pub overlay_font_path: Option<String>,
    pub service_endpoint: Option<String>,
    pub service_layout_model: String,
    pub service_read_model: String,
    pub service_api_version: String,
    pub service_timeout_secs: u64,
    pub service_poll_interval_ms: u64,
    pub service_pdf_dpi: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reconcile: ReconcileConfig::default(),
            fit: FitConfig::default(),
            overlay_text_color: "#000000".to_string(),
            overlay_handwritten_color: "#1a4fd6".to_string(),
            overlay_fill_color: "#ffffff".to_string(),
            overlay_font_family: None,
            overlay_font_path: None,
            service_endpoint: None,
            service_layout_model: DEFAULT_LAYOUT_MODEL.to_string(),
            service_read_model: DEFAULT_READ_MODEL.to_string(),
            service_api_version: DEFAULT_API_VERSION.to_string(),
            service_timeout_secs: 120,
            service_poll_interval_ms: 1000,
            service_pdf_dpi: 72.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    reconcile: Option<ReconcileSettings>,
    fit: Option<FitSettings>,
    overlay: Option<OverlaySettings>,
    service: Option<ServiceSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ReconcileSettings {
    iou_threshold: Option<f32>,
    vertical_gap: Option<f32>,
    horizontal_align: Option<f32>,
    snap_orientation: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FitSettings {
    max_font_size: Option<u32>,
    min_font_size: Option<u32>,
    fill_ratio: Option<f32>,
    line_height: Option<f32>,
    max_lines: Option<usize>,
    force_horizontal: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    text_color: Option<String>,
    handwritten_color: Option<String>,
    fill_color: Option<String>,
    font_family: Option<String>,
    font_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceSettings {
    endpoint: Option<String>,
    layout_model: Option<String>,
    read_model: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    pdf_dpi: Option<f32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(reconcile) = incoming.reconcile {
            if let Some(threshold) = reconcile.iou_threshold {
                if (0.0..1.0).contains(&threshold) {
                    self.reconcile.iou_threshold = threshold;
                }
            }
            if let Some(gap) = reconcile.vertical_gap {
                if gap > 0.0 {
                    self.reconcile.vertical_gap = gap;
                }
            }
            if let Some(align) = reconcile.horizontal_align {
                if align > 0.0 {
                    self.reconcile.horizontal_align = align;
                }
            }
            if let Some(snap) = reconcile.snap_orientation {
                self.reconcile.snap_orientation = snap;
            }
        }
        if let Some(fit) = incoming.fit {
            if let Some(size) = fit.max_font_size {
                if size > 0 {
                    self.fit.max_font_size = size;
                }
            }
            if let Some(size) = fit.min_font_size {
                if size > 0 {
                    self.fit.min_font_size = size;
                }
            }
            if let Some(ratio) = fit.fill_ratio {
                if ratio > 0.0 && ratio <= 1.0 {
                    self.fit.fill_ratio = ratio;
                }
            }
            if let Some(multiplier) = fit.line_height {
                if multiplier > 0.0 {
                    self.fit.line_height = multiplier;
                }
            }
            if let Some(max_lines) = fit.max_lines {
                self.fit.max_lines = max_lines;
            }
            if let Some(force) = fit.force_horizontal {
                self.fit.force_horizontal = force;
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(color) = non_empty(overlay.text_color) {
                self.overlay_text_color = color;
            }
            if let Some(color) = non_empty(overlay.handwritten_color) {
                self.overlay_handwritten_color = color;
            }
            if let Some(color) = non_empty(overlay.fill_color) {
                self.overlay_fill_color = color;
            }
            if let Some(family) = non_empty(overlay.font_family) {
                self.overlay_font_family = Some(family);
            }
            if let Some(path) = non_empty(overlay.font_path) {
                self.overlay_font_path = Some(path);
            }
        }
        if let Some(service) = incoming.service {
            if let Some(endpoint) = non_empty(service.endpoint) {
                self.service_endpoint = Some(endpoint);
            }
            if let Some(model) = non_empty(service.layout_model) {
                self.service_layout_model = model;
            }
            if let Some(model) = non_empty(service.read_model) {
                self.service_read_model = model;
            }
            if let Some(version) = non_empty(service.api_version) {
                self.service_api_version = version;
            }
            if let Some(timeout) = service.timeout_secs {
                if timeout > 0 {
                    self.service_timeout_secs = timeout;
                }
            }
            if let Some(interval) = service.poll_interval_ms {
                if interval > 0 {
                    self.service_poll_interval_ms = interval;
                }
            }
            if let Some(dpi) = service.pdf_dpi {
                if dpi > 0.0 {
                    self.service_pdf_dpi = dpi;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".ocr-reconcile"))
        }
    })
}
