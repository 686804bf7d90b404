//! Scoring weights and the preset registry
//!
//! A [`WeightRegistry`] is an explicit value built once at startup and passed
//! to whoever needs it. Custom presets fetched from elsewhere are validated
//! the same way as built-ins and carry no different contract.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::fingerprint::Layer;

/// One non-negative weight per layer. Callers need not normalize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub network: f64,
    pub graphics: f64,
    pub audio: f64,
    pub fonts: f64,
    pub navigator: f64,
    pub locale: f64,
    pub automation: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::balanced()
    }
}

impl ScoringWeights {
    pub fn balanced() -> Self {
        Self {
            network: 20.0,
            graphics: 15.0,
            audio: 10.0,
            fonts: 10.0,
            navigator: 10.0,
            locale: 10.0,
            automation: 25.0,
        }
    }

    pub fn uniform() -> Self {
        Self::from_fn(|_| 1.0)
    }

    pub fn from_fn(mut f: impl FnMut(Layer) -> f64) -> Self {
        Self {
            network: f(Layer::Network),
            graphics: f(Layer::Graphics),
            audio: f(Layer::Audio),
            fonts: f(Layer::Fonts),
            navigator: f(Layer::Navigator),
            locale: f(Layer::Locale),
            automation: f(Layer::Automation),
        }
    }

    pub fn get(&self, layer: Layer) -> f64 {
        match layer {
            Layer::Network => self.network,
            Layer::Graphics => self.graphics,
            Layer::Audio => self.audio,
            Layer::Fonts => self.fonts,
            Layer::Navigator => self.navigator,
            Layer::Locale => self.locale,
            Layer::Automation => self.automation,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for layer in Layer::ALL {
            let w = self.get(layer);
            if !w.is_finite() || w < 0.0 {
                return Err(ScanError::InvalidWeights(format!(
                    "weight for {} must be a finite non-negative number, got {}",
                    layer, w
                )));
            }
        }
        Ok(())
    }

    /// Normalize over `present` so the returned weights sum to 1.0.
    ///
    /// Layers not in `present` get no entry. If every present weight is zero
    /// the present layers share the weight equally. An empty `present`
    /// yields an empty map.
    pub fn normalized_over(&self, present: &[Layer]) -> BTreeMap<Layer, f64> {
        // Scaled by the largest weight first, so the sum stays finite
        // however large the individual weights are.
        let max = present.iter().map(|l| self.get(*l)).fold(0.0, f64::max);
        let total: f64 = if max > 0.0 {
            present.iter().map(|l| self.get(*l) / max).sum()
        } else {
            0.0
        };
        present
            .iter()
            .map(|layer| {
                let share = if total > 0.0 {
                    self.get(*layer) / max / total
                } else {
                    1.0 / present.len() as f64
                };
                (*layer, share)
            })
            .collect()
    }
}

/// A named weighting profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightPreset {
    pub id: String,
    pub name: String,
    pub description: String,
    pub weights: ScoringWeights,
    #[serde(default)]
    pub builtin: bool,
}

impl WeightPreset {
    fn builtin(id: &str, name: &str, description: &str, weights: ScoringWeights) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            weights,
            builtin: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ScanError::InvalidWeights("preset id must not be empty".into()));
        }
        self.weights.validate()
    }
}

/// The built-in presets, in display order.
pub fn builtin_presets() -> Vec<WeightPreset> {
    vec![
        WeightPreset::builtin(
            "balanced",
            "Balanced",
            "Even coverage with extra emphasis on IP leaks and automation markers.",
            ScoringWeights::balanced(),
        ),
        WeightPreset::builtin(
            "network_first",
            "Network first",
            "For VPN and proxy users: an exposed address outweighs everything else.",
            ScoringWeights {
                network: 45.0,
                graphics: 10.0,
                audio: 5.0,
                fonts: 5.0,
                navigator: 5.0,
                locale: 20.0,
                automation: 10.0,
            },
        ),
        WeightPreset::builtin(
            "bot_detection",
            "Bot detection",
            "Mirrors how anti-bot services look at a browser: automation and consistency first.",
            ScoringWeights {
                network: 10.0,
                graphics: 10.0,
                audio: 5.0,
                fonts: 5.0,
                navigator: 20.0,
                locale: 10.0,
                automation: 40.0,
            },
        ),
        WeightPreset::builtin(
            "hardware_focus",
            "Hardware fingerprint",
            "Emphasizes rendering, audio and font entropy that survives cookie clearing.",
            ScoringWeights {
                network: 10.0,
                graphics: 30.0,
                audio: 20.0,
                fonts: 20.0,
                navigator: 10.0,
                locale: 5.0,
                automation: 5.0,
            },
        ),
    ]
}

/// Immutable set of weight presets, built-ins first.
#[derive(Debug, Clone)]
pub struct WeightRegistry {
    presets: Vec<WeightPreset>,
}

impl Default for WeightRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl WeightRegistry {
    pub fn builtin() -> Self {
        Self {
            presets: builtin_presets(),
        }
    }

    /// Add a custom preset. Ids are unique across the registry.
    pub fn with_custom(mut self, mut preset: WeightPreset) -> Result<Self> {
        preset.validate()?;
        if self.get(&preset.id).is_some() {
            return Err(ScanError::DuplicatePreset(preset.id));
        }
        preset.builtin = false;
        self.presets.push(preset);
        Ok(self)
    }

    /// Add every preset of a JSON array, e.g. a remotely fetched custom list.
    pub fn with_custom_json(self, json: &str) -> Result<Self> {
        let presets: Vec<WeightPreset> = serde_json::from_str(json)?;
        presets
            .into_iter()
            .try_fold(self, |registry, preset| registry.with_custom(preset))
    }

    pub fn get(&self, id: &str) -> Option<&WeightPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn resolve(&self, id: &str) -> Result<&WeightPreset> {
        self.get(id).ok_or_else(|| ScanError::UnknownPreset(id.to_string()))
    }

    pub fn presets(&self) -> &[WeightPreset] {
        &self.presets
    }

    pub fn default_preset(&self) -> &WeightPreset {
        // builtin() always starts with "balanced"
        &self.presets[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_sums_to_one(map: &BTreeMap<Layer, f64>) {
        let sum: f64 = map.values().sum();
        assert!((sum - 1.0).abs() < 1e-9, "sum was {}", sum);
    }

    #[test]
    fn test_normalization_over_every_subset() {
        let weights = ScoringWeights::balanced();
        for mask in 1u32..(1 << Layer::ALL.len()) {
            let present: Vec<Layer> = Layer::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, l)| *l)
                .collect();
            let normalized = weights.normalized_over(&present);
            assert_eq!(normalized.len(), present.len());
            assert_sums_to_one(&normalized);
        }
    }

    #[test]
    fn test_zero_weights_fall_back_to_equal_shares() {
        let weights = ScoringWeights {
            network: 5.0,
            ..ScoringWeights::from_fn(|_| 0.0)
        };
        let normalized = weights.normalized_over(&[Layer::Audio, Layer::Fonts]);
        assert_eq!(normalized[&Layer::Audio], 0.5);
        assert_eq!(normalized[&Layer::Fonts], 0.5);
        assert!(weights.normalized_over(&[]).is_empty());
    }

    #[test]
    fn test_huge_weights_still_sum_to_one() {
        let weights = ScoringWeights::from_fn(|_| f64::MAX);
        assert!(weights.validate().is_ok());

        let normalized = weights.normalized_over(&Layer::ALL);
        assert_sums_to_one(&normalized);
        assert!(normalized.values().all(|w| w.is_finite()));

        let normalized = weights.normalized_over(&[Layer::Locale, Layer::Automation]);
        assert_eq!(normalized[&Layer::Locale], 0.5);
        assert_eq!(normalized[&Layer::Automation], 0.5);

        let lopsided = ScoringWeights {
            network: f64::MAX,
            ..ScoringWeights::from_fn(|_| 1.0)
        };
        let normalized = lopsided.normalized_over(&[Layer::Network, Layer::Fonts]);
        assert_sums_to_one(&normalized);
        assert_eq!(normalized[&Layer::Network], 1.0);
    }

    #[test]
    fn test_validate_rejects_negative_and_nan() {
        let mut weights = ScoringWeights::uniform();
        assert!(weights.validate().is_ok());
        weights.fonts = -1.0;
        assert!(matches!(weights.validate(), Err(ScanError::InvalidWeights(_))));
        weights.fonts = f64::NAN;
        assert!(weights.validate().is_err());
    }

    #[test]
    fn test_builtin_presets_are_valid() {
        let registry = WeightRegistry::builtin();
        assert_eq!(registry.default_preset().id, "balanced");
        for preset in registry.presets() {
            assert!(preset.builtin);
            preset.validate().unwrap();
        }
    }

    #[test]
    fn test_custom_presets() {
        let json = r#"[{
            "id": "mine",
            "name": "Mine",
            "description": "custom",
            "weights": { "network": 1, "automation": 3 },
            "builtin": true
        }]"#;
        let registry = WeightRegistry::builtin().with_custom_json(json).unwrap();
        let mine = registry.resolve("mine").unwrap();
        assert!(!mine.builtin);
        assert_eq!(mine.weights.automation, 3.0);
        // omitted layers fall back to the balanced profile
        assert_eq!(mine.weights.fonts, ScoringWeights::balanced().fonts);

        let clash = registry.clone().with_custom(mine.clone());
        assert!(matches!(clash, Err(ScanError::DuplicatePreset(_))));
        assert!(matches!(
            registry.resolve("nope"),
            Err(ScanError::UnknownPreset(_))
        ));
    }
}
