//! Fingerprint data model
//!
//! A scan produces one [`FingerprintData`]: an ordered map from each of the
//! seven [`Layer`]s to a [`LayerReading`]. A reading is either the layer's
//! typed [`RawLayerSignal`] or an explicit "unavailable" marker, so the map is
//! always total and the scoring engine can iterate every layer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::hash_parts;
use crate::error::ScanError;

/// Detection layers, in declaration order.
///
/// `Ord` follows declaration order, which is the iteration order of every
/// map keyed by layer and the order of issues and recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Network,
    Graphics,
    Audio,
    Fonts,
    Navigator,
    Locale,
    Automation,
}

impl Layer {
    pub const ALL: [Layer; 7] = [
        Layer::Network,
        Layer::Graphics,
        Layer::Audio,
        Layer::Fonts,
        Layer::Navigator,
        Layer::Locale,
        Layer::Automation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Network => "network",
            Layer::Graphics => "graphics",
            Layer::Audio => "audio",
            Layer::Fonts => "fonts",
            Layer::Navigator => "navigator",
            Layer::Locale => "locale",
            Layer::Automation => "automation",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Per-layer signals =====

/// Outcome of a single STUN probe server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeStatus {
    /// Gathering finished before the timeout
    Completed,
    /// Timeout elapsed; candidates found so far are kept
    TimedOut,
    /// The peer connection threw during setup
    Failed,
    /// RTCPeerConnection is not exposed
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StunProbe {
    pub server: String,
    pub status: ProbeStatus,
    pub candidates: usize,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkSignal {
    /// Private host-candidate addresses, deduplicated, in discovery order
    pub local_ips: Vec<String>,
    /// First public server-reflexive address
    pub public_ip: Option<String>,
    pub has_leak: bool,
    pub probes: Vec<StunProbe>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphicsSignal {
    pub canvas_hash: String,
    /// Bytes that differed between two identical renders
    pub noise_diff: usize,
    pub is_noisy: bool,
    /// Population uniqueness is not computed by the probe
    pub uniqueness: String,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    /// Whether WEBGL_debug_renderer_info exposed the unmasked strings
    pub webgl_unmasked: bool,
    pub webgl_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioSignal {
    /// Silent bins read as `-Infinity`; stored as `null` in JSON
    #[serde(with = "sample_serde")]
    pub sample: Vec<f32>,
    pub hash: String,
    pub distinct_values: usize,
    pub is_protected: bool,
    pub sample_rate: f32,
    pub max_channel_count: u32,
    pub channel_count: u32,
    pub base_latency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontsSignal {
    pub detected: Vec<String>,
    pub tested: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigatorSignal {
    pub user_agent: String,
    pub platform: String,
    pub vendor: String,
    pub language: String,
    pub hardware_concurrency: u32,
    pub device_memory: Option<f64>,
    pub max_touch_points: u32,
    pub cookie_enabled: bool,
    pub do_not_track: Option<String>,
    pub plugin_count: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u32,
    pub device_pixel_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocaleSignal {
    /// Offset from UTC in minutes, east-positive (UTC+2 is 120)
    pub utc_offset_minutes: i32,
    pub timezone: Option<String>,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutomationSignal {
    pub webdriver: bool,
    pub headless_user_agent: bool,
    pub phantom: bool,
    pub nightmare: bool,
    pub selenium_globals: bool,
    pub cdc_document_key: bool,
}

impl AutomationSignal {
    /// Names of every marker that is set, in field order.
    pub fn markers(&self) -> Vec<&'static str> {
        [
            (self.webdriver, "navigator.webdriver"),
            (self.headless_user_agent, "headless user agent"),
            (self.phantom, "PhantomJS globals"),
            (self.nightmare, "Nightmare globals"),
            (self.selenium_globals, "Selenium globals"),
            (self.cdc_document_key, "ChromeDriver document key"),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .map(|(_, name)| name)
        .collect()
    }

    pub fn any(&self) -> bool {
        !self.markers().is_empty()
    }
}

/// Raw measurement for one layer. One variant per layer, fixed schema each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawLayerSignal {
    Network(NetworkSignal),
    Graphics(GraphicsSignal),
    Audio(AudioSignal),
    Fonts(FontsSignal),
    Navigator(NavigatorSignal),
    Locale(LocaleSignal),
    Automation(AutomationSignal),
}

impl RawLayerSignal {
    pub fn layer(&self) -> Layer {
        match self {
            RawLayerSignal::Network(_) => Layer::Network,
            RawLayerSignal::Graphics(_) => Layer::Graphics,
            RawLayerSignal::Audio(_) => Layer::Audio,
            RawLayerSignal::Fonts(_) => Layer::Fonts,
            RawLayerSignal::Navigator(_) => Layer::Navigator,
            RawLayerSignal::Locale(_) => Layer::Locale,
            RawLayerSignal::Automation(_) => Layer::Automation,
        }
    }

    /// The layer's primary fingerprint value, compared across scans for drift.
    pub fn primary_fingerprint(&self) -> String {
        match self {
            RawLayerSignal::Network(n) => {
                let mut ips = n.local_ips.clone();
                ips.sort();
                hash_parts(&[ips.join(","), n.public_ip.clone().unwrap_or_default()])
            }
            RawLayerSignal::Graphics(g) => hash_parts(&[&g.canvas_hash, &g.webgl_hash]),
            RawLayerSignal::Audio(a) => a.hash.clone(),
            RawLayerSignal::Fonts(f) => {
                let mut fonts = f.detected.clone();
                fonts.sort();
                hash_parts(&fonts)
            }
            RawLayerSignal::Navigator(n) => hash_parts(&[
                n.user_agent.clone(),
                n.platform.clone(),
                n.vendor.clone(),
                n.language.clone(),
                n.hardware_concurrency.to_string(),
                n.device_memory.map(|m| m.to_string()).unwrap_or_default(),
                n.max_touch_points.to_string(),
                n.plugin_count.to_string(),
                format!("{}x{}x{}", n.screen_width, n.screen_height, n.color_depth),
                n.device_pixel_ratio.to_string(),
            ]),
            RawLayerSignal::Locale(l) => hash_parts(&[
                l.utc_offset_minutes.to_string(),
                l.timezone.clone().unwrap_or_default(),
                l.languages.join(","),
            ]),
            RawLayerSignal::Automation(a) => {
                let flags: String = [
                    a.webdriver,
                    a.headless_user_agent,
                    a.phantom,
                    a.nightmare,
                    a.selenium_globals,
                    a.cdc_document_key,
                ]
                .iter()
                .map(|f| if *f { '1' } else { '0' })
                .collect();
                hash_parts(&[flags])
            }
        }
    }
}

/// Why a layer has no signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnavailableReason {
    CapabilityMissing,
    TimedOut,
    ProbeFailed,
    /// Turned off in the scan configuration
    Disabled,
    /// Absent from externally supplied data
    Missing,
}

impl From<&ScanError> for UnavailableReason {
    fn from(err: &ScanError) -> Self {
        match err {
            ScanError::CapabilityMissing(_) => UnavailableReason::CapabilityMissing,
            ScanError::Timeout(_) => UnavailableReason::TimedOut,
            _ => UnavailableReason::ProbeFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LayerReading {
    Available { signal: RawLayerSignal },
    Unavailable { reason: UnavailableReason, detail: String },
}

impl LayerReading {
    pub fn unavailable(reason: UnavailableReason, detail: impl Into<String>) -> Self {
        LayerReading::Unavailable {
            reason,
            detail: detail.into(),
        }
    }

    pub fn signal(&self) -> Option<&RawLayerSignal> {
        match self {
            LayerReading::Available { signal } => Some(signal),
            LayerReading::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.signal().is_some()
    }
}

/// Complete snapshot of one scan. Every layer key is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "FingerprintDataRepr")]
pub struct FingerprintData {
    layers: BTreeMap<Layer, LayerReading>,
    collected_at_ms: f64,
}

impl FingerprintData {
    pub fn builder(collected_at_ms: f64) -> FingerprintBuilder {
        FingerprintBuilder {
            layers: BTreeMap::new(),
            collected_at_ms,
        }
    }

    pub fn reading(&self, layer: Layer) -> &LayerReading {
        // Construction guarantees totality; the fallback is unreachable.
        static MISSING: LayerReading = LayerReading::Unavailable {
            reason: UnavailableReason::Missing,
            detail: String::new(),
        };
        self.layers.get(&layer).unwrap_or(&MISSING)
    }

    pub fn signal(&self, layer: Layer) -> Option<&RawLayerSignal> {
        self.reading(layer).signal()
    }

    /// Readings in layer declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Layer, &LayerReading)> {
        self.layers.iter().map(|(layer, reading)| (*layer, reading))
    }

    pub fn available_layers(&self) -> Vec<Layer> {
        self.iter()
            .filter(|(_, r)| r.is_available())
            .map(|(layer, _)| layer)
            .collect()
    }

    pub fn collected_at_ms(&self) -> f64 {
        self.collected_at_ms
    }
}

/// Assembles a [`FingerprintData`]; `build` fills every layer never recorded.
#[derive(Debug)]
pub struct FingerprintBuilder {
    layers: BTreeMap<Layer, LayerReading>,
    collected_at_ms: f64,
}

impl FingerprintBuilder {
    pub fn signal(mut self, signal: RawLayerSignal) -> Self {
        self.insert(signal.layer(), LayerReading::Available { signal });
        self
    }

    pub fn unavailable(mut self, layer: Layer, reason: UnavailableReason, detail: &str) -> Self {
        self.insert(layer, LayerReading::unavailable(reason, detail));
        self
    }

    /// Record a collector outcome. Errors become unavailable readings, and a
    /// signal reported under the wrong layer is rejected the same way.
    pub fn record(&mut self, layer: Layer, outcome: Result<RawLayerSignal, ScanError>) {
        let reading = match outcome {
            Ok(signal) if signal.layer() == layer => LayerReading::Available { signal },
            Ok(signal) => LayerReading::unavailable(
                UnavailableReason::ProbeFailed,
                format!("collector for {} returned a {} signal", layer, signal.layer()),
            ),
            Err(err) => LayerReading::unavailable(UnavailableReason::from(&err), err.to_string()),
        };
        self.insert(layer, reading);
    }

    pub fn insert(&mut self, layer: Layer, reading: LayerReading) {
        self.layers.insert(layer, reading);
    }

    pub fn build(mut self) -> FingerprintData {
        for layer in Layer::ALL {
            self.layers.entry(layer).or_insert_with(|| {
                LayerReading::unavailable(UnavailableReason::Missing, "no reading recorded")
            });
        }
        FingerprintData {
            layers: self.layers,
            collected_at_ms: self.collected_at_ms,
        }
    }
}

/// Wire form; external data may omit layers or mislabel signals.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintDataRepr {
    #[serde(default)]
    layers: BTreeMap<Layer, LayerReading>,
    #[serde(default)]
    collected_at_ms: f64,
}

impl From<FingerprintDataRepr> for FingerprintData {
    fn from(repr: FingerprintDataRepr) -> Self {
        let mut builder = FingerprintData::builder(repr.collected_at_ms);
        for (layer, reading) in repr.layers {
            match reading {
                LayerReading::Available { signal } => builder.record(layer, Ok(signal)),
                unavailable => builder.insert(layer, unavailable),
            }
        }
        builder.build()
    }
}

/// JSON has no infinities, so non-finite bins travel as `null` and come back
/// as `-Infinity`. The sample hash is computed before serialization.
mod sample_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(sample: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        sample
            .iter()
            .map(|v| v.is_finite().then_some(*v))
            .collect::<Vec<Option<f32>>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let sample = Vec::<Option<f32>>::deserialize(deserializer)?;
        Ok(sample
            .into_iter()
            .map(|v| v.unwrap_or(f32::NEG_INFINITY))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_sample_survives_json() {
        let signal = AudioSignal {
            sample: vec![f32::NEG_INFINITY, -101.5],
            ..Default::default()
        };
        let json = serde_json::to_string(&signal).unwrap();
        assert!(json.contains("[null,-101.5]"));
        let back: AudioSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sample, signal.sample);
    }

    #[test]
    fn test_layer_order_is_declaration_order() {
        let mut shuffled = vec![Layer::Automation, Layer::Network, Layer::Locale, Layer::Audio];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![Layer::Network, Layer::Audio, Layer::Locale, Layer::Automation]
        );
    }

    #[test]
    fn test_builder_fills_missing_layers() {
        let data = FingerprintData::builder(0.0)
            .signal(RawLayerSignal::Fonts(FontsSignal::default()))
            .build();

        assert_eq!(data.iter().count(), 7);
        assert!(data.reading(Layer::Fonts).is_available());
        assert!(matches!(
            data.reading(Layer::Network),
            LayerReading::Unavailable {
                reason: UnavailableReason::Missing,
                ..
            }
        ));
        assert_eq!(data.available_layers(), vec![Layer::Fonts]);
    }

    #[test]
    fn test_record_maps_errors_to_reasons() {
        let mut builder = FingerprintData::builder(0.0);
        builder.record(Layer::Audio, Err(ScanError::Timeout(10_000)));
        builder.record(
            Layer::Network,
            Err(ScanError::CapabilityMissing("RTCPeerConnection".into())),
        );
        builder.record(
            Layer::Locale,
            Ok(RawLayerSignal::Fonts(FontsSignal::default())),
        );
        let data = builder.build();

        let reason = |layer| match data.reading(layer) {
            LayerReading::Unavailable { reason, .. } => Some(*reason),
            LayerReading::Available { .. } => None,
        };
        assert_eq!(reason(Layer::Audio), Some(UnavailableReason::TimedOut));
        assert_eq!(
            reason(Layer::Network),
            Some(UnavailableReason::CapabilityMissing)
        );
        assert_eq!(reason(Layer::Locale), Some(UnavailableReason::ProbeFailed));
    }

    #[test]
    fn test_deserialize_restores_totality() {
        let json = r#"{
            "layers": {
                "automation": { "status": "available", "signal": { "automation": { "webdriver": true } } }
            },
            "collectedAtMs": 12.0
        }"#;
        let data: FingerprintData = serde_json::from_str(json).unwrap();

        assert_eq!(data.iter().count(), 7);
        match data.signal(Layer::Automation) {
            Some(RawLayerSignal::Automation(a)) => assert!(a.webdriver),
            other => panic!("unexpected signal: {:?}", other),
        }
        assert!(!data.reading(Layer::Graphics).is_available());
    }

    #[test]
    fn test_network_fingerprint_ignores_ip_order() {
        let a = RawLayerSignal::Network(NetworkSignal {
            local_ips: vec!["10.0.0.2".into(), "192.168.1.5".into()],
            ..Default::default()
        });
        let b = RawLayerSignal::Network(NetworkSignal {
            local_ips: vec!["192.168.1.5".into(), "10.0.0.2".into()],
            ..Default::default()
        });
        assert_eq!(a.primary_fingerprint(), b.primary_fingerprint());
    }

    #[test]
    fn test_automation_markers() {
        let signal = AutomationSignal {
            webdriver: true,
            cdc_document_key: true,
            ..Default::default()
        };
        assert_eq!(
            signal.markers(),
            vec!["navigator.webdriver", "ChromeDriver document key"]
        );
        assert!(signal.any());
        assert!(!AutomationSignal::default().any());
    }
}
