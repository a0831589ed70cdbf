mod font;

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::debug;

use crate::reconcile::{MergedRegion, ScriptKind, snap_to_0_or_90};

pub use font::{FontMetrics, ResolvedFont, load_font_metrics, measure_text_width_px, resolve_font};

const FONT_SIZE_STEP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitConfig {
    pub max_font_size: u32,
    pub min_font_size: u32,
    pub fill_ratio: f32,
    pub line_height: f32,
    /// Zero means unlimited.
    pub max_lines: usize,
    pub force_horizontal: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_font_size: 40,
            min_font_size: 8,
            fill_ratio: 0.98,
            line_height: 1.15,
            max_lines: 0,
            force_horizontal: false,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_font_size > self.max_font_size {
            bail!(
                "min font size {} exceeds max font size {}",
                self.min_font_size,
                self.max_font_size
            );
        }
        if !(self.fill_ratio > 0.0) {
            bail!("fill ratio must be positive (got {})", self.fill_ratio);
        }
        if !(self.line_height > 0.0) {
            bail!("line height multiplier must be positive (got {})", self.line_height);
        }
        Ok(())
    }

    fn line_limit(&self) -> Option<usize> {
        if self.max_lines == 0 {
            None
        } else {
            Some(self.max_lines)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FitResult {
    pub font_size: u32,
    pub lines: Vec<String>,
}

/// Width and height text flows through: a 90 degree region runs along the
/// box's height.
pub fn effective_box(box_w: f32, box_h: f32, orientation_deg: f32, force_horizontal: bool) -> (f32, f32) {
    if !force_horizontal && snap_to_0_or_90(orientation_deg) == 90.0 {
        (box_h, box_w)
    } else {
        (box_w, box_h)
    }
}

/// Largest font size, stepping down by two from the maximum, whose wrapped
/// lines fit the box. Falls back to the minimum size truncated to the line
/// limit when nothing fits. Text with at least one visible character always
/// yields at least one line; blank text yields none at the minimum size.
pub fn wrap_text_to_box(
    text: &str,
    box_w: f32,
    box_h: f32,
    orientation_deg: f32,
    config: &FitConfig,
    font: Option<&FontMetrics>,
) -> Result<FitResult> {
    config.validate()?;
    if text.trim().is_empty() {
        return Ok(FitResult {
            font_size: config.min_font_size,
            lines: Vec::new(),
        });
    }
    let (flow_w, flow_h) = effective_box(box_w, box_h, orientation_deg, config.force_horizontal);
    let max_w = flow_w * config.fill_ratio;
    let max_h = flow_h * config.fill_ratio;
    let script = ScriptKind::detect(text);

    for font_size in (config.min_font_size..=config.max_font_size)
        .rev()
        .step_by(FONT_SIZE_STEP)
    {
        let lines = wrap_lines(text, script, max_w, font_size as f32, font);
        let total_height = lines.len() as f32 * font_size as f32 * config.line_height;
        let within_limit = config.line_limit().is_none_or(|limit| lines.len() <= limit);
        if !lines.is_empty() && total_height <= max_h && within_limit {
            return Ok(FitResult { font_size, lines });
        }
    }

    let font_size = config.min_font_size;
    let mut lines = wrap_lines(text, script, max_w, font_size as f32, font);
    if let Some(limit) = config.line_limit() {
        lines.truncate(limit);
    }
    debug!(
        "text did not fit {:.0}x{:.0}; using minimum font size {}",
        flow_w, flow_h, font_size
    );
    Ok(FitResult { font_size, lines })
}

pub fn fit_region(
    region: &MergedRegion,
    config: &FitConfig,
    font: Option<&FontMetrics>,
) -> Result<FitResult> {
    wrap_text_to_box(
        &region.display_text,
        region.bbox.width(),
        region.bbox.height(),
        region.orientation_deg,
        config,
        font,
    )
}

/// Breaks `text` into lines no wider than `max_width` at `font_size`.
/// Explicit newlines always break. A single unit wider than the line is kept
/// on a line of its own.
pub fn wrap_lines(
    text: &str,
    script: ScriptKind,
    max_width: f32,
    font_size: f32,
    font: Option<&FontMetrics>,
) -> Vec<String> {
    match script {
        ScriptKind::Cjk => wrap_chars(text, max_width, font_size, font),
        ScriptKind::Latin => wrap_words(text, max_width, font_size, font),
    }
}

fn wrap_chars(text: &str, max_width: f32, font_size: f32, font: Option<&FontMetrics>) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;

    for ch in text.chars() {
        if ch == '\n' {
            push_line(&mut result, &mut current);
            width = 0.0;
            continue;
        }
        if current.is_empty() && ch.is_whitespace() {
            continue;
        }
        let mut buf = [0u8; 4];
        let ch_width = measure_text_width_px(ch.encode_utf8(&mut buf), font_size, font);
        if width + ch_width > max_width && !current.is_empty() {
            push_line(&mut result, &mut current);
            width = 0.0;
            if ch.is_whitespace() {
                continue;
            }
        }
        current.push(ch);
        width += ch_width;
    }
    push_line(&mut result, &mut current);
    result
}

fn wrap_words(text: &str, max_width: f32, font_size: f32, font: Option<&FontMetrics>) -> Vec<String> {
    let space_width = measure_text_width_px(" ", font_size, font);
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut width = 0.0;
        for word in paragraph.split_whitespace() {
            let word_width = measure_text_width_px(word, font_size, font);
            if current.is_empty() {
                current.push_str(word);
                width = word_width;
                continue;
            }
            if width + space_width + word_width > max_width {
                push_line(&mut result, &mut current);
                current.push_str(word);
                width = word_width;
            } else {
                current.push(' ');
                current.push_str(word);
                width += space_width + word_width;
            }
        }
        push_line(&mut result, &mut current);
    }
    result
}

fn push_line(result: &mut Vec<String>, current: &mut String) {
    let line = current.trim_end();
    if !line.is_empty() {
        result.push(line.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_takes_largest_size() {
        let fit = wrap_text_to_box("店舗名", 200.0, 60.0, 0.0, &FitConfig::default(), None)
            .expect("fit");
        // 3 chars * 40 = 120 <= 196, 46 <= 58.8
        assert_eq!(fit.font_size, 40);
        assert_eq!(fit.lines, vec!["店舗名"]);
    }

    #[test]
    fn cjk_wraps_per_character() {
        let config = FitConfig {
            max_font_size: 10,
            min_font_size: 10,
            fill_ratio: 1.0,
            ..FitConfig::default()
        };
        let fit = wrap_text_to_box("衛生点検記録", 30.0, 100.0, 0.0, &config, None).expect("fit");
        assert_eq!(fit.lines, vec!["衛生点", "検記録"]);
    }

    #[test]
    fn latin_wraps_on_word_boundaries() {
        let lines = wrap_lines("Hand wash station ok", ScriptKind::Latin, 60.0, 10.0, None);
        // "Hand wash" = 22 + 2.5 + 22 = 46.5; adding "station" overflows
        assert_eq!(lines, vec!["Hand wash", "station ok"]);
    }

    #[test]
    fn overlong_word_keeps_its_own_line() {
        let lines = wrap_lines("a Refrigeration b", ScriptKind::Latin, 20.0, 10.0, None);
        assert_eq!(lines, vec!["a", "Refrigeration", "b"]);
    }

    #[test]
    fn steps_down_until_height_fits() {
        let config = FitConfig {
            max_font_size: 20,
            min_font_size: 4,
            fill_ratio: 1.0,
            line_height: 1.0,
            ..FitConfig::default()
        };
        // 20: 4 per line -> 2 lines, 40 > 30; 18: 4 per line -> 2 lines, 36 > 30;
        // 16: 5 per line -> 2 lines, 32 > 30; 14: 5 per line -> 2 lines, 28 fits
        let fit = wrap_text_to_box("点検点検点検点検", 80.0, 30.0, 0.0, &config, None).expect("fit");
        assert_eq!(fit.font_size, 14);
        assert_eq!(fit.lines.len(), 2);
    }

    #[test]
    fn falls_back_to_minimum_and_truncates() {
        let config = FitConfig {
            max_font_size: 12,
            min_font_size: 10,
            fill_ratio: 1.0,
            line_height: 1.0,
            max_lines: 2,
            force_horizontal: false,
        };
        let fit = wrap_text_to_box("店舗名店舗名店舗名", 20.0, 5.0, 0.0, &config, None).expect("fit");
        assert_eq!(fit.font_size, 10);
        assert_eq!(fit.lines, vec!["店舗", "名店"]);
    }

    #[test]
    fn never_returns_empty_lines_for_text() {
        let config = FitConfig {
            max_font_size: 30,
            min_font_size: 30,
            ..FitConfig::default()
        };
        let fit = wrap_text_to_box("Inspection", 1.0, 1.0, 0.0, &config, None).expect("fit");
        assert_eq!(fit.font_size, 30);
        assert_eq!(fit.lines, vec!["Inspection"]);
    }

    #[test]
    fn vertical_regions_swap_box_axes() {
        let config = FitConfig {
            max_font_size: 10,
            min_font_size: 10,
            fill_ratio: 1.0,
            line_height: 1.0,
            ..FitConfig::default()
        };
        let horizontal = wrap_text_to_box("衛生点検", 12.0, 40.0, 0.0, &config, None).expect("fit");
        assert_eq!(horizontal.lines.len(), 4);
        let vertical = wrap_text_to_box("衛生点検", 12.0, 40.0, 90.0, &config, None).expect("fit");
        assert_eq!(vertical.lines, vec!["衛生点検"]);

        let forced = FitConfig {
            force_horizontal: true,
            ..config
        };
        let fit = wrap_text_to_box("衛生点検", 12.0, 40.0, 90.0, &forced, None).expect("fit");
        assert_eq!(fit.lines.len(), 4);
    }

    #[test]
    fn inverted_font_range_is_rejected() {
        let config = FitConfig {
            max_font_size: 8,
            min_font_size: 12,
            ..FitConfig::default()
        };
        let err = wrap_text_to_box("x", 100.0, 100.0, 0.0, &config, None).unwrap_err();
        assert!(err.to_string().contains("exceeds max font size"));
    }

    #[test]
    fn blank_text_has_nothing_to_draw() {
        for text in ["", " ", "   ", "\n\n", " \u{3000} "] {
            let fit = wrap_text_to_box(text, 100.0, 100.0, 0.0, &FitConfig::default(), None)
                .expect("fit");
            assert!(fit.lines.is_empty(), "{:?}", text);
            assert_eq!(fit.font_size, 8);
        }
    }

    #[test]
    fn padded_text_still_yields_a_line() {
        let fit = wrap_text_to_box("  ok  ", 100.0, 100.0, 0.0, &FitConfig::default(), None)
            .expect("fit");
        assert_eq!(fit.lines, vec!["ok"]);
    }

    #[test]
    fn blank_text_still_checks_the_font_range() {
        let config = FitConfig {
            max_font_size: 8,
            min_font_size: 12,
            ..FitConfig::default()
        };
        assert!(wrap_text_to_box(" ", 100.0, 100.0, 0.0, &config, None).is_err());
    }
}
