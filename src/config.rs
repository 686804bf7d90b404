//! Scan configuration
//!
//! Everything tunable about a scan lives in [`ScanConfig`]. JavaScript callers
//! pass a plain object; omitted fields take their defaults.
//!
//! ```javascript
//! await collect_fingerprint({ stunTimeoutMs: 2000, layers: { audio: false } });
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::fingerprint::Layer;

pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun.cloudflare.com:3478",
];

/// Fonts probed by the font collector. Generic families are the fallbacks,
/// not candidates.
pub const DEFAULT_FONT_CANDIDATES: &[&str] = &[
    "Arial",
    "Arial Black",
    "Calibri",
    "Cambria",
    "Comic Sans MS",
    "Consolas",
    "Courier New",
    "DejaVu Sans",
    "Droid Sans",
    "Fira Code",
    "Georgia",
    "Helvetica",
    "Helvetica Neue",
    "Impact",
    "Liberation Sans",
    "Lucida Console",
    "Menlo",
    "Monaco",
    "Noto Sans",
    "Palatino Linotype",
    "Roboto",
    "Segoe UI",
    "SF Pro Text",
    "Tahoma",
    "Times New Roman",
    "Trebuchet MS",
    "Ubuntu",
    "Verdana",
];

/// Which layers to collect. All enabled by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerToggles {
    pub network: bool,
    pub graphics: bool,
    pub audio: bool,
    pub fonts: bool,
    pub navigator: bool,
    pub locale: bool,
    pub automation: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self {
            network: true,
            graphics: true,
            audio: true,
            fonts: true,
            navigator: true,
            locale: true,
            automation: true,
        }
    }
}

impl LayerToggles {
    pub fn is_enabled(&self, layer: Layer) -> bool {
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
}

/// Configuration for a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    /// STUN servers probed by the WebRTC leak collector, in order
    pub stun_servers: Vec<String>,
    /// Per-server ICE gathering timeout
    pub stun_timeout_ms: u64,
    /// Outer budget applied to every collector
    pub collector_budget_ms: u64,
    /// How long the audio chain runs before sampling
    pub audio_settle_ms: u64,
    /// Canvas renders differing in more bytes than this are "noisy"
    pub canvas_noise_threshold: usize,
    /// Audio samples with fewer distinct values than this are "protected"
    pub audio_distinct_threshold: usize,
    pub font_candidates: Vec<String>,
    pub layers: LayerToggles,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            stun_servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            stun_timeout_ms: 3_000,
            collector_budget_ms: 10_000,
            audio_settle_ms: 200,
            canvas_noise_threshold: 10,
            audio_distinct_threshold: 5,
            font_candidates: DEFAULT_FONT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            layers: LayerToggles::default(),
        }
    }
}

impl ScanConfig {
    /// Short timeouts for tests and quick re-scans
    pub fn quick() -> Self {
        Self {
            stun_timeout_ms: 1_000,
            collector_budget_ms: 3_000,
            audio_settle_ms: 100,
            ..Default::default()
        }
    }

    pub fn stun_timeout(&self) -> Duration {
        Duration::from_millis(self.stun_timeout_ms)
    }

    pub fn collector_budget(&self) -> Duration {
        Duration::from_millis(self.collector_budget_ms)
    }

    pub fn audio_settle(&self) -> Duration {
        Duration::from_millis(self.audio_settle_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.layers.network && self.stun_servers.is_empty() {
            return Err(ScanError::InvalidConfig(
                "stunServers must not be empty while the network layer is enabled".into(),
            ));
        }
        if self.stun_timeout_ms == 0 || self.collector_budget_ms == 0 {
            return Err(ScanError::InvalidConfig("timeouts must be greater than zero".into()));
        }
        if self.stun_timeout_ms > self.collector_budget_ms {
            log::warn!(
                "stunTimeoutMs ({}) exceeds collectorBudgetMs ({}); slow probes will be cut off",
                self.stun_timeout_ms,
                self.collector_budget_ms
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.stun_servers.len(), 3);
        assert_eq!(config.stun_timeout(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
        assert!(Layer::ALL.iter().all(|l| config.layers.is_enabled(*l)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{ "stunTimeoutMs": 1500, "layers": { "audio": false } }"#)
                .unwrap();
        assert_eq!(config.stun_timeout_ms, 1500);
        assert_eq!(config.collector_budget_ms, 10_000);
        assert!(!config.layers.is_enabled(Layer::Audio));
        assert!(config.layers.is_enabled(Layer::Network));
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let empty = ScanConfig {
            stun_servers: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(empty.validate(), Err(ScanError::InvalidConfig(_))));

        let zero = ScanConfig {
            collector_budget_ms: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let network_off = ScanConfig {
            stun_servers: Vec::new(),
            layers: LayerToggles {
                network: false,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(network_off.validate().is_ok());
    }
}
