//! Fingerprint drift between two scans of the same profile

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fingerprint::{FingerprintData, Layer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDrift {
    /// `None` when either scan has no reading for the layer
    pub changed: Option<bool>,
    pub current: Option<String>,
    pub previous: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub layers: BTreeMap<Layer, LayerDrift>,
    /// Current overall minus previous overall, same weights
    pub score_delta: i32,
    /// Layers whose fingerprint definitely changed, in layer order
    pub changed_layers: Vec<Layer>,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        !self.changed_layers.is_empty()
    }
}

/// Compare primary fingerprints layer by layer.
pub fn layer_drift(current: &FingerprintData, previous: &FingerprintData) -> BTreeMap<Layer, LayerDrift> {
    Layer::ALL
        .iter()
        .map(|&layer| {
            let now = current.signal(layer).map(|s| s.primary_fingerprint());
            let before = previous.signal(layer).map(|s| s.primary_fingerprint());
            let changed = match (&now, &before) {
                (Some(a), Some(b)) => Some(a != b),
                _ => None,
            };
            (
                layer,
                LayerDrift {
                    changed,
                    current: now,
                    previous: before,
                },
            )
        })
        .collect()
}

pub(crate) fn build_report(layers: BTreeMap<Layer, LayerDrift>, score_delta: i32) -> DriftReport {
    let changed_layers = layers
        .iter()
        .filter(|(_, drift)| drift.changed == Some(true))
        .map(|(layer, _)| *layer)
        .collect();
    DriftReport {
        layers,
        score_delta,
        changed_layers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{FontsSignal, RawLayerSignal, UnavailableReason};

    fn fonts(names: &[&str]) -> RawLayerSignal {
        RawLayerSignal::Fonts(FontsSignal {
            detected: names.iter().map(|s| s.to_string()).collect(),
            tested: 28,
        })
    }

    #[test]
    fn test_changed_is_tristate() {
        let before = FingerprintData::builder(0.0).signal(fonts(&["Arial"])).build();
        let same = FingerprintData::builder(1.0).signal(fonts(&["Arial"])).build();
        let other = FingerprintData::builder(1.0).signal(fonts(&["Arial", "Ubuntu"])).build();
        let gone = FingerprintData::builder(1.0)
            .unavailable(Layer::Fonts, UnavailableReason::TimedOut, "timeout")
            .build();

        assert_eq!(layer_drift(&same, &before)[&Layer::Fonts].changed, Some(false));
        assert_eq!(layer_drift(&other, &before)[&Layer::Fonts].changed, Some(true));
        assert_eq!(layer_drift(&gone, &before)[&Layer::Fonts].changed, None);
        assert_eq!(layer_drift(&same, &before)[&Layer::Audio].changed, None);
    }

    #[test]
    fn test_font_order_does_not_count_as_drift() {
        let a = FingerprintData::builder(0.0).signal(fonts(&["Arial", "Ubuntu"])).build();
        let b = FingerprintData::builder(0.0).signal(fonts(&["Ubuntu", "Arial"])).build();
        assert_eq!(layer_drift(&a, &b)[&Layer::Fonts].changed, Some(false));
    }

    #[test]
    fn test_report_lists_changed_layers() {
        let before = FingerprintData::builder(0.0).signal(fonts(&["Arial"])).build();
        let after = FingerprintData::builder(0.0).signal(fonts(&["Consolas"])).build();
        let report = build_report(layer_drift(&after, &before), -5);
        assert!(report.has_drift());
        assert_eq!(report.changed_layers, vec![Layer::Fonts]);
        assert_eq!(report.score_delta, -5);
    }
}
