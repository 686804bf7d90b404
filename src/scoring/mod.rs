//! Consistency and scoring engine
//!
//! [`score`] is a pure function of its inputs: the same fingerprint, weights
//! and context always produce a byte-identical [`TrustScore`]. Every map in
//! the output is ordered by [`Layer`].
//!
//! ```text
//! layer score = round(100 * (1 - sum(penalty) / checks))
//! overall     = round(sum(layer score * normalized weight))   available layers only
//! ```

mod drift;
mod recommendations;
mod rules;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fingerprint::{FingerprintData, Layer, LayerReading};
use crate::weights::ScoringWeights;

pub use drift::{layer_drift, DriftReport, LayerDrift};
pub use recommendations::{recommendation_for, recommendations};
pub use rules::{
    evaluate, format_offset, os_from_platform, os_from_user_agent, Check, CheckId, CheckStatus,
    GeolocationHint, OsFamily, ScoreContext, FONT_ENUMERATION_LIMIT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerStatus {
    Pass,
    Warn,
    Fail,
    Unavailable,
}

impl From<CheckStatus> for LayerStatus {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Pass => LayerStatus::Pass,
            CheckStatus::Warn => LayerStatus::Warn,
            CheckStatus::Fail => LayerStatus::Fail,
        }
    }
}

/// Letter grade. `Ord` runs from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    F,
    D,
    C,
    B,
    A,
}

pub fn grade_for(overall: u8) -> Grade {
    match overall {
        90..=u8::MAX => Grade::A,
        75..=89 => Grade::B,
        60..=74 => Grade::C,
        40..=59 => Grade::D,
        _ => Grade::F,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerResult {
    /// `None` for unavailable layers
    pub score: Option<u8>,
    pub status: LayerStatus,
    /// Normalized weight actually applied; 0 when unavailable
    pub weight: f64,
    pub checks: Vec<Check>,
}

impl LayerResult {
    fn unavailable() -> Self {
        Self {
            score: None,
            status: LayerStatus::Unavailable,
            weight: 0.0,
            checks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustScore {
    pub overall: u8,
    pub grade: Grade,
    pub layers: BTreeMap<Layer, LayerResult>,
    /// Failing checks, in layer order
    pub critical_issues: Vec<Check>,
    /// Warning checks, in layer order
    pub warnings: Vec<Check>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub drift: Option<DriftReport>,
}

/// Layer score from its checks. A layer with no checks scores 100.
pub fn layer_score(checks: &[Check]) -> u8 {
    if checks.is_empty() {
        return 100;
    }
    let penalty: f64 = checks.iter().map(|c| c.status.penalty()).sum();
    let score = 100.0 * (1.0 - penalty / checks.len() as f64);
    score.round().clamp(0.0, 100.0) as u8
}

/// Worst check status; `Pass` for no checks.
pub fn layer_status(checks: &[Check]) -> LayerStatus {
    checks
        .iter()
        .map(|c| c.status)
        .max()
        .unwrap_or(CheckStatus::Pass)
        .into()
}

/// Score `data` under `weights`. With `previous`, also report drift against
/// it; drift never changes `overall`.
///
/// Fails only on invalid weights.
pub fn score(
    data: &FingerprintData,
    weights: &ScoringWeights,
    previous: Option<&FingerprintData>,
    context: &ScoreContext,
) -> Result<TrustScore> {
    weights.validate()?;
    let mut trust = assess(data, weights, context);
    if let Some(previous) = previous {
        let before = assess(previous, weights, context);
        trust.drift = Some(drift::build_report(
            layer_drift(data, previous),
            trust.overall as i32 - before.overall as i32,
        ));
    }
    Ok(trust)
}

/// Drift between two scans, with the score delta under `weights`.
pub fn compare(
    current: &FingerprintData,
    previous: &FingerprintData,
    weights: &ScoringWeights,
) -> Result<DriftReport> {
    weights.validate()?;
    let context = ScoreContext::default();
    let delta = assess(current, weights, &context).overall as i32
        - assess(previous, weights, &context).overall as i32;
    Ok(drift::build_report(layer_drift(current, previous), delta))
}

fn assess(data: &FingerprintData, weights: &ScoringWeights, context: &ScoreContext) -> TrustScore {
    let normalized = weights.normalized_over(&data.available_layers());

    let mut layers = BTreeMap::new();
    let mut weighted = 0.0;
    for (layer, reading) in data.iter() {
        let result = match reading {
            LayerReading::Available { signal } => {
                let checks = evaluate(signal, context);
                let score = layer_score(&checks);
                let weight = normalized.get(&layer).copied().unwrap_or(0.0);
                weighted += score as f64 * weight;
                LayerResult {
                    score: Some(score),
                    status: layer_status(&checks),
                    weight,
                    checks,
                }
            }
            LayerReading::Unavailable { .. } => LayerResult::unavailable(),
        };
        layers.insert(layer, result);
    }

    let overall = if normalized.is_empty() {
        0
    } else {
        weighted.round().clamp(0.0, 100.0) as u8
    };

    let all_checks: Vec<&Check> = layers.values().flat_map(|r| r.checks.iter()).collect();
    let critical_issues = all_checks
        .iter()
        .filter(|c| c.status == CheckStatus::Fail)
        .map(|c| (*c).clone())
        .collect();
    let warnings = all_checks
        .iter()
        .filter(|c| c.status == CheckStatus::Warn)
        .map(|c| (*c).clone())
        .collect();
    let recommendations = recommendations(all_checks.iter().copied());

    TrustScore {
        overall,
        grade: grade_for(overall),
        layers,
        critical_issues,
        warnings,
        recommendations,
        drift: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{
        AudioSignal, AutomationSignal, FontsSignal, GraphicsSignal, LocaleSignal, NavigatorSignal,
        NetworkSignal, RawLayerSignal, UnavailableReason,
    };

    /// A browser that passes every check.
    fn hardened() -> Vec<RawLayerSignal> {
        vec![
            RawLayerSignal::Network(NetworkSignal::default()),
            RawLayerSignal::Graphics(GraphicsSignal {
                canvas_hash: "aa".into(),
                noise_diff: 412,
                is_noisy: true,
                uniqueness: "unknown".into(),
                ..Default::default()
            }),
            RawLayerSignal::Audio(AudioSignal {
                hash: "bb".into(),
                distinct_values: 1,
                is_protected: true,
                ..Default::default()
            }),
            RawLayerSignal::Fonts(FontsSignal {
                detected: vec!["Arial".into(), "Courier New".into()],
                tested: 28,
            }),
            RawLayerSignal::Navigator(NavigatorSignal {
                user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:115.0) Gecko/20100101 Firefox/115.0".into(),
                platform: "Linux x86_64".into(),
                ..Default::default()
            }),
            RawLayerSignal::Locale(LocaleSignal::default()),
            RawLayerSignal::Automation(AutomationSignal::default()),
        ]
    }

    fn data_from(signals: Vec<RawLayerSignal>) -> FingerprintData {
        signals
            .into_iter()
            .fold(FingerprintData::builder(1_700_000_000_000.0), |b, s| b.signal(s))
            .build()
    }

    fn leaking() -> FingerprintData {
        let mut signals = hardened();
        signals[0] = RawLayerSignal::Network(NetworkSignal {
            local_ips: vec!["192.168.1.5".into()],
            public_ip: Some("8.8.8.8".into()),
            has_leak: true,
            probes: vec![],
        });
        data_from(signals)
    }

    fn balanced() -> ScoringWeights {
        ScoringWeights::balanced()
    }

    #[test]
    fn test_leak_scenario() {
        let trust = score(&leaking(), &balanced(), None, &ScoreContext::default()).unwrap();

        assert_eq!(trust.overall, 80);
        assert_eq!(trust.grade, Grade::B);
        assert_eq!(trust.critical_issues.len(), 1);
        assert_eq!(trust.critical_issues[0].id, CheckId::WebrtcLeak);
        assert_eq!(trust.critical_issues[0].layer, Layer::Network);
        assert!(trust.warnings.is_empty());
        assert_eq!(
            trust.recommendations,
            vec![recommendation_for(CheckId::WebrtcLeak).to_string()]
        );
        assert_eq!(trust.layers[&Layer::Network].score, Some(0));
        assert_eq!(trust.layers[&Layer::Network].status, LayerStatus::Fail);
        assert!(trust.drift.is_none());
    }

    #[test]
    fn test_missing_audio_is_excluded() {
        let mut signals = hardened();
        signals.remove(2);
        let data = signals
            .into_iter()
            .fold(FingerprintData::builder(0.0), |b, s| b.signal(s))
            .unavailable(Layer::Audio, UnavailableReason::CapabilityMissing, "no AudioContext")
            .build();

        let trust = score(&data, &balanced(), None, &ScoreContext::default()).unwrap();

        assert_eq!(trust.overall, 100);
        assert_eq!(trust.grade, Grade::A);
        let audio = &trust.layers[&Layer::Audio];
        assert_eq!(audio.status, LayerStatus::Unavailable);
        assert_eq!(audio.score, None);
        assert_eq!(audio.weight, 0.0);
        assert!(audio.checks.is_empty());

        let used: f64 = trust.layers.values().map(|r| r.weight).sum();
        assert!((used - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_huge_weights_score_a_clean_scan_fully() {
        let weights = ScoringWeights::from_fn(|_| f64::MAX);
        let trust = score(&data_from(hardened()), &weights, None, &ScoreContext::default()).unwrap();

        assert_eq!(trust.overall, 100);
        assert_eq!(trust.grade, Grade::A);
        for layer in [Layer::Locale, Layer::Automation] {
            assert_eq!(trust.layers[&layer].score, Some(100));
            assert!(trust.layers[&layer].weight.is_finite());
        }
    }

    #[test]
    fn test_nothing_available() {
        let data = FingerprintData::builder(0.0).build();
        let trust = score(&data, &balanced(), None, &ScoreContext::default()).unwrap();
        assert_eq!(trust.overall, 0);
        assert_eq!(trust.grade, Grade::F);
        assert_eq!(trust.layers.len(), Layer::ALL.len());
        assert!(trust.recommendations.is_empty());
    }

    #[test]
    fn test_deterministic_output() {
        let context = ScoreContext {
            geolocation: Some(GeolocationHint {
                label: Some("Tokyo".into()),
                utc_offsets_minutes: vec![540],
            }),
        };
        let data = leaking();
        let first = score(&data, &balanced(), Some(&data), &context).unwrap();
        let second = score(&data, &balanced(), Some(&data), &context).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_grades_are_monotonic() {
        let mut previous = Grade::F;
        for overall in 0..=100u8 {
            let grade = grade_for(overall);
            assert!(grade >= previous, "grade dropped at {}", overall);
            previous = grade;
        }
        assert_eq!(grade_for(90), Grade::A);
        assert_eq!(grade_for(89), Grade::B);
        assert_eq!(grade_for(75), Grade::B);
        assert_eq!(grade_for(60), Grade::C);
        assert_eq!(grade_for(40), Grade::D);
        assert_eq!(grade_for(39), Grade::F);
    }

    #[test]
    fn test_layer_score_rounding() {
        let warn = Check {
            id: CheckId::CanvasUnprotected,
            layer: Layer::Graphics,
            message: String::new(),
            status: CheckStatus::Warn,
        };
        let pass = Check {
            status: CheckStatus::Pass,
            ..warn.clone()
        };
        assert_eq!(layer_score(&[]), 100);
        assert_eq!(layer_score(&[warn.clone()]), 50);
        assert_eq!(layer_score(&[warn.clone(), pass.clone()]), 75);
        assert_eq!(layer_status(&[pass, warn]), LayerStatus::Warn);
    }

    #[test]
    fn test_drift_does_not_change_overall() {
        let before = data_from(hardened());
        let after = leaking();

        let plain = score(&after, &balanced(), None, &ScoreContext::default()).unwrap();
        let with_drift = score(&after, &balanced(), Some(&before), &ScoreContext::default()).unwrap();
        assert_eq!(plain.overall, with_drift.overall);

        let drift = with_drift.drift.unwrap();
        assert_eq!(drift.score_delta, -20);
        assert_eq!(drift.changed_layers, vec![Layer::Network]);
        assert_eq!(drift.layers[&Layer::Graphics].changed, Some(false));

        let compared = compare(&after, &before, &balanced()).unwrap();
        assert_eq!(compared, drift);
    }

    #[test]
    fn test_invalid_weights_are_rejected() {
        let weights = ScoringWeights {
            audio: -1.0,
            ..ScoringWeights::balanced()
        };
        assert!(score(&leaking(), &weights, None, &ScoreContext::default()).is_err());
    }
}
