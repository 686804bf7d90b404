//! # Trackscan WASM
//!
//! Shows a visitor what a tracking script can learn about their browser and
//! rates how trackable it is, compiled to WebAssembly.
//!
//! ## Architecture
//!
//! ```text
//! Collectors (network, graphics, audio, fonts, navigator, locale, automation)
//!   ↓  RawLayerSignal per layer, concurrently
//! Orchestrator
//!   ↓  FingerprintData (every layer present)
//! Scoring engine  ←  ScoringWeights (WeightRegistry presets)
//!   ↓
//! TrustScore (+ DriftReport against a previous scan)
//! ```
//!
//! ## Features
//!
//! - **Browser only**: every probe uses standard web APIs
//! - **Never fails a scan**: missing or broken APIs become unavailable layers
//! - **Deterministic scoring**: identical inputs give byte-identical output
//! - **Configurable weighting**: built-in presets plus validated custom ones

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod collectors;
pub mod config;
pub mod crypto;
mod error;
pub mod fingerprint;
pub mod orchestrator;
pub mod runtime;
pub mod scoring;
pub mod weights;

pub use config::{LayerToggles, ScanConfig};
pub use error::{ErrorCode, ErrorInfo, Result, ScanError};
pub use fingerprint::{
    FingerprintData, Layer, LayerReading, RawLayerSignal, UnavailableReason,
};
pub use orchestrator::{Orchestrator, ScanProgress};
pub use scoring::{
    compare, score, Check, CheckId, CheckStatus, DriftReport, GeolocationHint, Grade, LayerResult,
    LayerStatus, ScoreContext, TrustScore,
};
pub use weights::{builtin_presets, ScoringWeights, WeightPreset, WeightRegistry};

/// Run a scan with the browser collectors.
pub async fn collect<P>(config: ScanConfig, on_progress: P) -> FingerprintData
where
    P: FnMut(&ScanProgress),
{
    Orchestrator::new(config).collect(on_progress).await
}

/// Initialize the module
///
/// Sets up logging.
#[wasm_bindgen(start)]
pub fn init() {
    // A second init (e.g. the module instantiated twice) keeps the first logger.
    if console_log::init_with_level(log::Level::Info).is_ok() {
        log::info!("trackscan initialized");
    }
}

/// Collect a fingerprint.
///
/// `options` is a partial [`ScanConfig`]; `onProgress`, if given, is called
/// with a [`ScanProgress`] after each layer resolves.
#[wasm_bindgen]
pub async fn collect_fingerprint(
    options: JsValue,
    on_progress: Option<js_sys::Function>,
) -> std::result::Result<JsValue, JsValue> {
    let config: ScanConfig = from_js_or_default(options)?;
    config.validate()?;

    let data = collect(config, |progress| {
        let Some(callback) = &on_progress else {
            return;
        };
        match to_js(progress) {
            Ok(value) => {
                if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                    log::warn!("onProgress threw: {:?}", err);
                }
            }
            Err(err) => log::warn!("Failed to serialize progress: {}", err),
        }
    })
    .await;

    Ok(to_js(&data)?)
}

/// Score a fingerprint.
///
/// `weights` is a [`ScoringWeights`] object (omitted layers use the balanced
/// profile); `previous` enables drift reporting; `context` is a
/// [`ScoreContext`].
#[wasm_bindgen]
pub fn score_fingerprint(
    data: JsValue,
    weights: JsValue,
    previous: JsValue,
    context: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    let data: FingerprintData = from_js(data)?;
    let weights: ScoringWeights = from_js_or_default(weights)?;
    let previous: Option<FingerprintData> = from_js_optional(previous)?;
    let context: ScoreContext = from_js_or_default(context)?;

    let trust = score(&data, &weights, previous.as_ref(), &context)?;
    Ok(to_js(&trust)?)
}

/// Drift report between two fingerprints.
#[wasm_bindgen]
pub fn compare_fingerprints(
    current: JsValue,
    previous: JsValue,
    weights: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    let current: FingerprintData = from_js(current)?;
    let previous: FingerprintData = from_js(previous)?;
    let weights: ScoringWeights = from_js_or_default(weights)?;

    let report = compare(&current, &previous, &weights)?;
    Ok(to_js(&report)?)
}

#[wasm_bindgen]
pub fn builtin_weight_presets() -> std::result::Result<JsValue, JsValue> {
    Ok(to_js(WeightRegistry::builtin().presets())?)
}

/// Look up a preset by id among the built-ins and `customPresets`
/// (an array of [`WeightPreset`] objects).
#[wasm_bindgen]
pub fn resolve_weight_preset(
    id: &str,
    custom_presets: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    let custom: Vec<WeightPreset> = from_js_or_default(custom_presets)?;
    let registry = custom
        .into_iter()
        .try_fold(WeightRegistry::builtin(), |registry, preset| registry.with_custom(preset))?;
    Ok(to_js(registry.resolve(id)?)?)
}

/// Plain objects, not `Map`s, so results are JSON-friendly on the JS side.
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue> {
    Ok(value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
}

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T> {
    Ok(serde_wasm_bindgen::from_value(value)?)
}

fn from_js_optional<T: DeserializeOwned>(value: JsValue) -> Result<Option<T>> {
    if value.is_undefined() || value.is_null() {
        Ok(None)
    } else {
        from_js(value).map(Some)
    }
}

fn from_js_or_default<T: DeserializeOwned + Default>(value: JsValue) -> Result<T> {
    Ok(from_js_optional(value)?.unwrap_or_default())
}

/// Score a scan right after collecting it, for Rust callers.
pub async fn collect_and_score(
    config: ScanConfig,
    weights: &ScoringWeights,
    context: &ScoreContext,
) -> Result<(FingerprintData, TrustScore)> {
    config.validate()?;
    let data = collect(config, |_| {}).await;
    let trust = score(&data, weights, None, context)?;
    Ok((data, trust))
}
