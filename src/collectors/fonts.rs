//! Installed-font detection (fonts layer)
//!
//! Measures a probe string in each candidate font with a generic fallback
//! behind it. When the candidate is missing the browser renders the fallback,
//! so the width matches the bare fallback width. Any mismatch against any of
//! the three generic bases counts as present.

use async_trait::async_trait;
use web_sys::CanvasRenderingContext2d;

use super::js_helpers::{self, js_err, ScratchCanvas};
use super::Collector;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::fingerprint::{FontsSignal, Layer, RawLayerSignal};

pub const BASE_FAMILIES: [&str; 3] = ["monospace", "sans-serif", "serif"];

const PROBE_TEXT: &str = "mmmmmmmmmmlli";
const PROBE_SIZE_PX: u32 = 72;

/// CSS font shorthand for `family` with `base` as fallback.
pub fn font_stack(family: &str, base: &str) -> String {
    format!("{}px '{}', {}", PROBE_SIZE_PX, family.replace('\'', ""), base)
}

/// A font is present if its width differs from the fallback's for any base.
pub fn is_font_present(base_widths: &[f64], widths: &[f64]) -> bool {
    base_widths
        .iter()
        .zip(widths)
        .any(|(base, width)| (base - width).abs() > f64::EPSILON)
}

/// Collector for the fonts layer.
pub struct FontsCollector;

#[async_trait(?Send)]
impl Collector for FontsCollector {
    fn layer(&self) -> Layer {
        Layer::Fonts
    }

    async fn collect(&self, config: &ScanConfig) -> Result<RawLayerSignal> {
        let document = js_helpers::document()?;
        let canvas = ScratchCanvas::new(&document, 1, 1)?;
        let ctx = canvas.context_2d()?;

        let base_widths = BASE_FAMILIES
            .iter()
            .map(|base| measure(&ctx, &format!("{}px {}", PROBE_SIZE_PX, base)))
            .collect::<Result<Vec<f64>>>()?;

        let mut detected = Vec::new();
        for family in &config.font_candidates {
            let widths = BASE_FAMILIES
                .iter()
                .map(|base| measure(&ctx, &font_stack(family, base)))
                .collect::<Result<Vec<f64>>>()?;
            if is_font_present(&base_widths, &widths) {
                detected.push(family.clone());
            }
        }

        log::debug!(
            "{} of {} candidate font(s) detected",
            detected.len(),
            config.font_candidates.len()
        );
        Ok(RawLayerSignal::Fonts(FontsSignal {
            detected,
            tested: config.font_candidates.len(),
        }))
    }
}

fn measure(ctx: &CanvasRenderingContext2d, font: &str) -> Result<f64> {
    ctx.set_font(font);
    let metrics = ctx.measure_text(PROBE_TEXT).map_err(js_err("measureText"))?;
    Ok(metrics.width())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_stack() {
        assert_eq!(font_stack("Arial", "serif"), "72px 'Arial', serif");
        assert_eq!(font_stack("Tom's Font", "monospace"), "72px 'Toms Font', monospace");
    }

    #[test]
    fn test_missing_font_matches_every_base() {
        let bases = [600.0, 540.5, 512.25];
        assert!(!is_font_present(&bases, &bases));
    }

    #[test]
    fn test_one_differing_base_is_enough() {
        let bases = [600.0, 540.5, 512.25];
        assert!(is_font_present(&bases, &[600.0, 541.0, 512.25]));
    }
}
