//! Navigator and screen properties (navigator layer)
//!
//! Read through `Reflect` so that properties a browser does not implement
//! (`deviceMemory` outside Chromium, `doNotTrack` in newer Safari) come back
//! as defaults instead of errors.

use async_trait::async_trait;
use wasm_bindgen::prelude::*;

use super::js_helpers::{get_bool, get_f64, get_global, get_prop, get_string};
use super::Collector;
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::fingerprint::{Layer, NavigatorSignal, RawLayerSignal};

/// Collector for the navigator layer.
pub struct NavigatorCollector;

#[async_trait(?Send)]
impl Collector for NavigatorCollector {
    fn layer(&self) -> Layer {
        Layer::Navigator
    }

    async fn collect(&self, _config: &ScanConfig) -> Result<RawLayerSignal> {
        let navigator = get_global("navigator")
            .ok_or_else(|| ScanError::CapabilityMissing("navigator".into()))?;
        let screen = get_global("screen").unwrap_or(JsValue::UNDEFINED);

        Ok(RawLayerSignal::Navigator(read_navigator(&navigator, &screen)))
    }
}

fn read_navigator(navigator: &JsValue, screen: &JsValue) -> NavigatorSignal {
    let count = |obj: &JsValue, prop: &str| get_f64(obj, prop).map(clamp_u32).unwrap_or(0);

    NavigatorSignal {
        user_agent: get_string(navigator, "userAgent").unwrap_or_default(),
        platform: get_string(navigator, "platform").unwrap_or_default(),
        vendor: get_string(navigator, "vendor").unwrap_or_default(),
        language: get_string(navigator, "language").unwrap_or_default(),
        hardware_concurrency: count(navigator, "hardwareConcurrency"),
        device_memory: get_f64(navigator, "deviceMemory"),
        max_touch_points: count(navigator, "maxTouchPoints"),
        cookie_enabled: get_bool(navigator, "cookieEnabled").unwrap_or(false),
        do_not_track: get_string(navigator, "doNotTrack"),
        plugin_count: get_prop(navigator, "plugins")
            .map(|plugins| count(&plugins, "length"))
            .unwrap_or(0),
        screen_width: count(screen, "width"),
        screen_height: count(screen, "height"),
        color_depth: count(screen, "colorDepth"),
        device_pixel_ratio: get_global("devicePixelRatio")
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0),
    }
}

/// Saturating conversion for numeric browser properties.
pub fn clamp_u32(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= u32::MAX as f64 {
        u32::MAX
    } else {
        value as u32
    }
}
