//! Timezone and language settings (locale layer)

use async_trait::async_trait;
use js_sys::{Array, Date, Intl, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use super::js_helpers::{get_global, get_prop, get_string};
use super::Collector;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::fingerprint::{Layer, LocaleSignal, RawLayerSignal};

/// `Date.getTimezoneOffset()` is west-positive; signals store east-positive
/// minutes so UTC+2 reads as `120`.
pub fn utc_offset_from_js(timezone_offset: f64) -> i32 {
    if timezone_offset.is_finite() {
        -(timezone_offset.round() as i32)
    } else {
        0
    }
}

/// Collector for the locale layer.
pub struct LocaleCollector;

#[async_trait(?Send)]
impl Collector for LocaleCollector {
    fn layer(&self) -> Layer {
        Layer::Locale
    }

    async fn collect(&self, _config: &ScanConfig) -> Result<RawLayerSignal> {
        let utc_offset_minutes = utc_offset_from_js(Date::new_0().get_timezone_offset());
        let timezone = resolved_timezone();
        let languages = navigator_languages();

        log::debug!("locale: offset {} min, zone {:?}", utc_offset_minutes, timezone);
        Ok(RawLayerSignal::Locale(LocaleSignal {
            utc_offset_minutes,
            timezone,
            languages,
        }))
    }
}

/// `Intl.DateTimeFormat().resolvedOptions().timeZone`, if exposed.
fn resolved_timezone() -> Option<String> {
    let format = Intl::DateTimeFormat::new(&Array::new(), &Object::new());
    let options: JsValue = format.resolved_options().into();
    get_string(&options, "timeZone").filter(|tz| !tz.is_empty())
}

fn navigator_languages() -> Vec<String> {
    let Some(navigator) = get_global("navigator") else {
        return Vec::new();
    };
    let languages: Vec<String> = get_prop(&navigator, "languages")
        .and_then(|v| v.dyn_into::<Array>().ok())
        .map(|list| list.iter().filter_map(|v| v.as_string()).collect())
        .unwrap_or_default();
    if !languages.is_empty() {
        return languages;
    }
    Reflect::get(&navigator, &JsValue::from_str("language"))
        .ok()
        .and_then(|v| v.as_string())
        .into_iter()
        .collect()
}
