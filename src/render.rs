use anyhow::{Context, Result, anyhow, ensure};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use crate::fit::{FitConfig, FitResult, FontMetrics, effective_box};
use crate::reconcile::{MergedRegion, snap_to_0_or_90};

pub struct OverlayStyle {
    pub text_color: String,
    pub handwritten_color: String,
    pub fill_color: String,
    pub font_family: Option<String>,
    pub font_metrics: Option<FontMetrics>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_color: "#000000".to_string(),
            handwritten_color: "#1a4fd6".to_string(),
            fill_color: "#ffffff".to_string(),
            font_family: None,
            font_metrics: None,
        }
    }
}

fn svg_open(svg: &mut String, image_bytes: &[u8], image_mime: &str, width: u32, height: u32) {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));
}

/// Paints each region's box with the fill colour and writes its fitted lines
/// inside it. Vertical regions are drawn in a frame rotated 90 degrees about
/// the box center.
#[allow(clippy::too_many_arguments)]
pub fn render_overlay_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    regions: &[MergedRegion],
    fits: &[FitResult],
    fit_config: &FitConfig,
    style: &OverlayStyle,
) -> Result<String> {
    ensure!(
        regions.len() == fits.len(),
        "{} regions but {} fit results",
        regions.len(),
        fits.len()
    );
    let mut svg = String::new();
    svg_open(&mut svg, image_bytes, image_mime, width, height);

    let font_family = style
        .font_family
        .as_deref()
        .or_else(|| style.font_metrics.as_ref().and_then(|m| m.family()));

    for (idx, (region, fit)) in regions.iter().zip(fits).enumerate() {
        let bbox = region.bbox;
        let (box_w, box_h) = (bbox.width(), bbox.height());
        if box_w <= 0.0 || box_h <= 0.0 {
            continue;
        }
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"##,
            x = bbox.min_x,
            y = bbox.min_y,
            w = box_w,
            h = box_h,
            fill = &style.fill_color
        ));
        if fit.lines.is_empty() {
            continue;
        }

        let (flow_w, flow_h) = effective_box(
            box_w,
            box_h,
            region.orientation_deg,
            fit_config.force_horizontal,
        );
        let rotated = !fit_config.force_horizontal && snap_to_0_or_90(region.orientation_deg) == 90.0;
        let (cx, cy) = (bbox.center_x(), bbox.center_y());
        let left = cx - flow_w / 2.0;
        let top = cy - flow_h / 2.0;
        let inset_x = flow_w * (1.0 - fit_config.fill_ratio) / 2.0;
        let font_size = fit.font_size as f32;
        let line_height = font_size * fit_config.line_height;
        let block_h = fit.lines.len() as f32 * line_height;
        let start_y = top + ((flow_h - block_h) / 2.0).max(0.0) + font_size;
        let text_x = left + inset_x;

        let clip_id = format!("clip-{}", idx);
        svg.push_str(&format!(
            r#"<clipPath id="{id}"><rect x="{x}" y="{y}" width="{w}" height="{h}"/></clipPath>"#,
            id = clip_id,
            x = bbox.min_x,
            y = bbox.min_y,
            w = box_w,
            h = box_h
        ));
        svg.push_str(&format!(r#"<g clip-path="url(#{})">"#, clip_id));
        let color = if region.is_handwritten {
            style.handwritten_color.as_str()
        } else {
            style.text_color.as_str()
        };
        let mut text_open = format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}""#,
            x = text_x,
            y = start_y,
            size = font_size,
            color = color
        );
        if let Some(family) = font_family {
            text_open.push_str(&format!(r#" font-family="{}""#, escape_xml(family)));
        }
        if rotated {
            text_open.push_str(&format!(r#" transform="rotate(90 {} {})""#, cx, cy));
        }
        text_open.push('>');
        svg.push_str(&text_open);
        for (line_idx, line_text) in fit.lines.iter().enumerate() {
            let escaped = escape_xml(line_text);
            if line_idx == 0 {
                svg.push_str(&escaped);
            } else {
                svg.push_str(&format!(
                    r#"<tspan x="{x}" dy="{dy}">{text}</tspan>"#,
                    x = text_x,
                    dy = line_height,
                    text = escaped
                ));
            }
        }
        svg.push_str("</text></g>");
    }

    svg.push_str("</svg>");
    Ok(svg)
}

/// Outlines every region; handwritten regions get their own stroke colour.
pub fn render_regions_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    regions: &[MergedRegion],
) -> Result<String> {
    let mut svg = String::new();
    svg_open(&mut svg, image_bytes, image_mime, width, height);

    for region in regions {
        let bbox = region.bbox;
        let stroke = if region.is_handwritten {
            "#1a4fd6"
        } else {
            "#00c853"
        };
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{stroke}" stroke-width="2"/>"##,
            x = bbox.min_x,
            y = bbox.min_y,
            w = bbox.width(),
            h = bbox.height(),
            stroke = stroke
        ));
    }

    svg.push_str("</svg>");
    Ok(svg)
}

pub fn render_svg_bytes(svg: &str, output_mime: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    let encoded: image::DynamicImage = match format {
        image::ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(image).to_rgb8().into(),
        _ => image::DynamicImage::ImageRgba8(image),
    };
    encoded
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

pub fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/gif" => Some(image::ImageFormat::Gif),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        "image/tiff" => Some(image::ImageFormat::Tiff),
        _ => None,
    }
}

pub fn mime_from_path(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
