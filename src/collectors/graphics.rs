//! Canvas and WebGL fingerprinting (graphics layer)
//!
//! The same fixed scene is drawn into two independent canvases. Identical
//! instructions on the same browser must produce identical pixels; if the two
//! buffers differ beyond a small threshold the browser is injecting per-read
//! noise, which is the protection signal this layer reports.
//!
//! WebGL vendor/renderer strings are read separately, preferring the unmasked
//! values exposed by `WEBGL_debug_renderer_info`.

use std::f64::consts::PI;

use async_trait::async_trait;
use base64::Engine as _;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, WebGlRenderingContext};

use super::js_helpers::{self, js_err, ScratchCanvas};
use super::Collector;
use crate::config::ScanConfig;
use crate::crypto::{hash_parts, sha256_hex};
use crate::error::Result;
use crate::fingerprint::{GraphicsSignal, Layer, RawLayerSignal};

const CANVAS_WIDTH: u32 = 280;
const CANVAS_HEIGHT: u32 = 60;
const SCENE_TEXT: &str = "Cwm fjordbank glyphs vext quiz, \u{1F603}";

// WEBGL_debug_renderer_info
const UNMASKED_VENDOR_WEBGL: u32 = 0x9245;
const UNMASKED_RENDERER_WEBGL: u32 = 0x9246;

/// Number of bytes that differ between two pixel buffers. Extra trailing
/// bytes in the longer buffer count as differences.
pub fn count_byte_differences(a: &[u8], b: &[u8]) -> usize {
    let common = a.iter().zip(b).filter(|(x, y)| x != y).count();
    common + a.len().abs_diff(b.len())
}

/// Renders are noisy when they differ in more than `threshold` bytes.
pub fn is_noisy(noise_diff: usize, threshold: usize) -> bool {
    noise_diff > threshold
}

/// Hash a `toDataURL()` result. The base64 payload is decoded so the digest
/// covers the PNG bytes; an undecodable URL is hashed as text.
pub fn data_url_hash(data_url: &str) -> String {
    let payload = data_url.split_once(',').map(|(_, p)| p).unwrap_or(data_url);
    match base64::engine::general_purpose::STANDARD.decode(payload) {
        Ok(bytes) => sha256_hex(&bytes),
        Err(_) => sha256_hex(data_url.as_bytes()),
    }
}

/// Collector for the graphics layer.
pub struct GraphicsCollector;

#[async_trait(?Send)]
impl Collector for GraphicsCollector {
    fn layer(&self) -> Layer {
        Layer::Graphics
    }

    async fn collect(&self, config: &ScanConfig) -> Result<RawLayerSignal> {
        let document = js_helpers::document()?;

        let first = ScratchCanvas::new(&document, CANVAS_WIDTH, CANVAS_HEIGHT)?;
        let second = ScratchCanvas::new(&document, CANVAS_WIDTH, CANVAS_HEIGHT)?;
        let pixels_a = render_scene(&first.context_2d()?)?;
        let pixels_b = render_scene(&second.context_2d()?)?;

        let noise_diff = count_byte_differences(&pixels_a, &pixels_b);
        let noisy = is_noisy(noise_diff, config.canvas_noise_threshold);
        log::debug!("canvas renders differ in {} byte(s), noisy: {}", noise_diff, noisy);

        let data_url = first.element().to_data_url().map_err(js_err("toDataURL"))?;
        let canvas_hash = data_url_hash(&data_url);

        let (webgl_vendor, webgl_renderer, webgl_unmasked) = read_webgl_identity(&document);
        let webgl_hash = hash_parts(&[&webgl_vendor, &webgl_renderer]);

        Ok(RawLayerSignal::Graphics(GraphicsSignal {
            canvas_hash,
            noise_diff,
            is_noisy: noisy,
            uniqueness: "unknown".into(),
            webgl_vendor,
            webgl_renderer,
            webgl_unmasked,
            webgl_hash,
        }))
    }
}

/// Draw the fixed scene and return the raw RGBA buffer.
#[allow(deprecated)]
fn render_scene(ctx: &CanvasRenderingContext2d) -> Result<Vec<u8>> {
    ctx.set_text_baseline("alphabetic");
    ctx.set_fill_style(&JsValue::from_str("#f60"));
    ctx.fill_rect(125.0, 1.0, 62.0, 20.0);

    ctx.set_font("14px 'Arial'");
    ctx.set_fill_style(&JsValue::from_str("#069"));
    ctx.fill_text(SCENE_TEXT, 2.0, 15.0).map_err(js_err("fillText"))?;

    ctx.set_font("18px 'Times New Roman'");
    ctx.set_fill_style(&JsValue::from_str("rgba(102, 204, 0, 0.7)"));
    ctx.fill_text(SCENE_TEXT, 4.0, 45.0).map_err(js_err("fillText"))?;

    ctx.set_stroke_style(&JsValue::from_str("rgb(255, 0, 255)"));
    ctx.set_line_width(2.0);
    ctx.begin_path();
    ctx.arc(240.0, 30.0, 20.0, 0.0, PI * 1.5).map_err(js_err("arc"))?;
    ctx.stroke();

    let image = ctx
        .get_image_data(0.0, 0.0, CANVAS_WIDTH as f64, CANVAS_HEIGHT as f64)
        .map_err(js_err("getImageData"))?;
    Ok(image.data().0)
}

/// Vendor, renderer, and whether the unmasked strings were readable.
/// Missing WebGL yields empty strings.
fn read_webgl_identity(document: &Document) -> (String, String, bool) {
    let Ok(canvas) = ScratchCanvas::new(document, 1, 1) else {
        return (String::new(), String::new(), false);
    };
    let gl: Option<WebGlRenderingContext> = canvas
        .element()
        .get_context("webgl")
        .ok()
        .flatten()
        .and_then(|ctx| ctx.dyn_into().ok());
    let Some(gl) = gl else {
        log::debug!("WebGL unavailable");
        return (String::new(), String::new(), false);
    };

    let read = |param: u32| {
        gl.get_parameter(param)
            .ok()
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    };

    let debug_info = gl
        .get_extension("WEBGL_debug_renderer_info")
        .ok()
        .flatten();
    if debug_info.is_some() {
        let vendor = read(UNMASKED_VENDOR_WEBGL);
        let renderer = read(UNMASKED_RENDERER_WEBGL);
        if !vendor.is_empty() || !renderer.is_empty() {
            return (vendor, renderer, true);
        }
    }
    (
        read(WebGlRenderingContext::VENDOR),
        read(WebGlRenderingContext::RENDERER),
        false,
    )
}
