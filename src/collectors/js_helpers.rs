//! Reflect and DOM utility wrappers shared by the collectors.
//!
//! Every accessor tolerates missing features: an absent global or property
//! reads as `None` instead of throwing.

use js_sys::Reflect;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, Window};

use crate::error::{Result, ScanError};

/// Get the global window object.
pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| ScanError::CapabilityMissing("window".into()))
}

/// Get the document of the global window.
pub fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| ScanError::CapabilityMissing("document".into()))
}

/// Read a property, treating `undefined` and `null` as absent.
pub fn get_prop(obj: &JsValue, prop: &str) -> Option<JsValue> {
    Reflect::get(obj, &JsValue::from_str(prop))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

/// Read a property from the global scope.
pub fn get_global(prop: &str) -> Option<JsValue> {
    get_prop(&js_sys::global(), prop)
}

pub fn has_global(prop: &str) -> bool {
    get_global(prop).is_some()
}

pub fn get_string(obj: &JsValue, prop: &str) -> Option<String> {
    get_prop(obj, prop).and_then(|v| v.as_string())
}

pub fn get_f64(obj: &JsValue, prop: &str) -> Option<f64> {
    get_prop(obj, prop).and_then(|v| v.as_f64())
}

pub fn get_bool(obj: &JsValue, prop: &str) -> Option<bool> {
    get_prop(obj, prop).and_then(|v| v.as_bool())
}

/// Map a thrown JS value into a probe error with context.
pub fn js_err(context: &'static str) -> impl Fn(JsValue) -> ScanError {
    move |value| ScanError::from_js(context, value)
}

/// An offscreen canvas whose backing store is released on drop.
pub struct ScratchCanvas {
    canvas: HtmlCanvasElement,
}

impl ScratchCanvas {
    pub fn new(document: &Document, width: u32, height: u32) -> Result<Self> {
        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(js_err("createElement(canvas)"))?
            .dyn_into()
            .map_err(|_| ScanError::CapabilityMissing("HTMLCanvasElement".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);
        Ok(Self { canvas })
    }

    pub fn element(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    pub fn context_2d(&self) -> Result<CanvasRenderingContext2d> {
        self.canvas
            .get_context("2d")
            .map_err(js_err("getContext(2d)"))?
            .ok_or_else(|| ScanError::CapabilityMissing("2D canvas context".into()))?
            .dyn_into()
            .map_err(|_| ScanError::CapabilityMissing("CanvasRenderingContext2D".into()))
    }
}

impl Drop for ScratchCanvas {
    fn drop(&mut self) {
        self.canvas.set_width(0);
        self.canvas.set_height(0);
    }
}
