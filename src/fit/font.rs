use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::{Face, name_id};
use usvg::fontdb;

use crate::reconcile::is_cjk_char;

/// One parsed face: the raw font bytes plus what width measurement needs.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontMetrics {
    fn from_face_data(data: Arc<Vec<u8>>, face_index: u32) -> Result<Self> {
        let face = Face::parse(&data, face_index)
            .map_err(|err| anyhow!("face {} is not a usable font ({})", face_index, err))?;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = glyph_advance(&face, ' ').unwrap_or(units_per_em / 2);
        let family = family_name(&face);
        Ok(Self {
            data,
            face_index,
            units_per_em,
            space_advance,
            family,
        })
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

/// Loads the first face of a font file (or collection).
pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    FontMetrics::from_face_data(Arc::new(data), 0)
        .with_context(|| format!("failed to parse font: {}", path.display()))
}

pub struct ResolvedFont {
    pub metrics: FontMetrics,
    pub family: String,
}

/// An explicit font file wins. Otherwise the requested family, then each
/// fallback family, is looked up among the system fonts.
pub fn resolve_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[&str],
) -> Result<ResolvedFont> {
    if let Some(path) = font_path {
        let metrics = load_font_metrics(path)?;
        let family = metrics
            .family()
            .or(font_family)
            .unwrap_or("sans-serif")
            .to_string();
        return Ok(ResolvedFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    let candidates: Vec<&str> = font_family.into_iter().chain(fallback.iter().copied()).collect();
    candidates
        .iter()
        .find_map(|family| lookup_system_font(&db, family))
        .ok_or_else(|| anyhow!("none of the fonts [{}] is installed", candidates.join(", ")))
}

fn lookup_system_font(db: &fontdb::Database, family: &str) -> Option<ResolvedFont> {
    let families = [if family.eq_ignore_ascii_case("sans-serif") {
        fontdb::Family::SansSerif
    } else {
        fontdb::Family::Name(family)
    }];
    let id = db.query(&fontdb::Query {
        families: &families,
        ..Default::default()
    })?;
    let (data, face_index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
    let metrics = FontMetrics::from_face_data(Arc::new(data), face_index).ok()?;
    let family = db
        .face(id)
        .and_then(|info| info.families.first())
        .map(|(name, _)| name.clone())
        .or_else(|| metrics.family().map(str::to_string))
        .unwrap_or_else(|| family.to_string());
    Some(ResolvedFont { metrics, family })
}

/// Rendered width of `text` at `font_size`. Without a usable face the width is
/// estimated from per-character em fractions.
pub fn measure_text_width_px(text: &str, font_size: f32, font: Option<&FontMetrics>) -> f32 {
    let face = font.and_then(|font| {
        Face::parse(&font.data, font.face_index)
            .ok()
            .map(|face| (font, face))
    });
    match face {
        Some((font, face)) => {
            let units: u32 = text
                .chars()
                .filter(|ch| *ch != '\n')
                .map(|ch| match ch {
                    ' ' => font.space_advance as u32,
                    _ => glyph_advance(&face, ch).unwrap_or(font.space_advance) as u32,
                })
                .sum();
            units as f32 * font_size / font.units_per_em as f32
        }
        None => text.chars().map(estimated_em).sum::<f32>() * font_size,
    }
}

fn glyph_advance(face: &Face<'_>, ch: char) -> Option<u16> {
    face.glyph_index(ch)
        .and_then(|glyph| face.glyph_hor_advance(glyph))
}

fn estimated_em(ch: char) -> f32 {
    match ch {
        '\n' => 0.0,
        ch if ch.is_whitespace() => 0.25,
        ch if ch.is_ascii_alphanumeric() => 0.55,
        ch if ch.is_ascii() => 0.35,
        ch if is_cjk_char(ch) => 1.0,
        _ => 0.9,
    }
}

/// Typographic family if the face declares one, else the legacy family name.
fn family_name(face: &Face<'_>) -> Option<String> {
    [name_id::TYPOGRAPHIC_FAMILY, name_id::FAMILY]
        .into_iter()
        .find_map(|wanted| {
            face.names()
                .into_iter()
                .filter(|name| name.name_id == wanted)
                .find_map(|name| name.to_string())
        })
}
