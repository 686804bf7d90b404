//! Per-layer rule sets
//!
//! Each layer has a fixed, ordered list of checks. A check turns one piece of
//! a raw signal into `pass`, `warn` or `fail`; nothing here depends on other
//! layers or on the weights.

use serde::{Deserialize, Serialize};

use crate::fingerprint::{
    AudioSignal, AutomationSignal, FontsSignal, GraphicsSignal, Layer, LocaleSignal,
    NavigatorSignal, NetworkSignal, RawLayerSignal,
};

/// More detected fonts than this makes the font set a usable identifier.
pub const FONT_ENUMERATION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckId {
    WebrtcLeak,
    CanvasUnprotected,
    WebglRendererExposed,
    AudioUnprotected,
    FontsEnumerable,
    PlatformMismatch,
    TimezoneMismatch,
    AutomationDetected,
}

/// Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    /// Fraction of the layer's score lost to this check.
    pub fn penalty(&self) -> f64 {
        match self {
            CheckStatus::Pass => 0.0,
            CheckStatus::Warn => 0.5,
            CheckStatus::Fail => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: CheckId,
    pub layer: Layer,
    pub message: String,
    pub status: CheckStatus,
}

impl Check {
    fn new(id: CheckId, layer: Layer, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            id,
            layer,
            message: message.into(),
            status,
        }
    }
}

/// Where the visitor claims (or is believed) to be, e.g. from an IP lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeolocationHint {
    pub label: Option<String>,
    /// Acceptable east-positive UTC offsets, in minutes
    pub utc_offsets_minutes: Vec<i32>,
}

/// Optional inputs that refine some checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreContext {
    pub geolocation: Option<GeolocationHint>,
}

/// Run the layer's checks in their fixed order.
pub fn evaluate(signal: &RawLayerSignal, context: &ScoreContext) -> Vec<Check> {
    match signal {
        RawLayerSignal::Network(s) => network(s),
        RawLayerSignal::Graphics(s) => graphics(s),
        RawLayerSignal::Audio(s) => audio(s),
        RawLayerSignal::Fonts(s) => fonts(s),
        RawLayerSignal::Navigator(s) => navigator(s),
        RawLayerSignal::Locale(s) => locale(s, context),
        RawLayerSignal::Automation(s) => automation(s),
    }
}

fn network(signal: &NetworkSignal) -> Vec<Check> {
    let check = if signal.has_leak {
        let mut exposed = signal.local_ips.clone();
        exposed.extend(signal.public_ip.iter().cloned());
        Check::new(
            CheckId::WebrtcLeak,
            Layer::Network,
            CheckStatus::Fail,
            format!("WebRTC exposes your IP address: {}", exposed.join(", ")),
        )
    } else {
        Check::new(
            CheckId::WebrtcLeak,
            Layer::Network,
            CheckStatus::Pass,
            "No IP address leaked through WebRTC",
        )
    };
    vec![check]
}

fn graphics(signal: &GraphicsSignal) -> Vec<Check> {
    let canvas = if signal.is_noisy {
        Check::new(
            CheckId::CanvasUnprotected,
            Layer::Graphics,
            CheckStatus::Pass,
            "Canvas readback is randomized",
        )
    } else {
        Check::new(
            CheckId::CanvasUnprotected,
            Layer::Graphics,
            CheckStatus::Warn,
            "Canvas output is stable and can be used as a fingerprint",
        )
    };
    let webgl = if signal.webgl_unmasked {
        Check::new(
            CheckId::WebglRendererExposed,
            Layer::Graphics,
            CheckStatus::Warn,
            format!("WebGL reveals your GPU: {}", signal.webgl_renderer),
        )
    } else {
        Check::new(
            CheckId::WebglRendererExposed,
            Layer::Graphics,
            CheckStatus::Pass,
            "Unmasked GPU renderer is hidden",
        )
    };
    vec![canvas, webgl]
}

fn audio(signal: &AudioSignal) -> Vec<Check> {
    let check = if signal.is_protected {
        Check::new(
            CheckId::AudioUnprotected,
            Layer::Audio,
            CheckStatus::Pass,
            "Audio processing output is masked",
        )
    } else {
        Check::new(
            CheckId::AudioUnprotected,
            Layer::Audio,
            CheckStatus::Warn,
            format!(
                "Audio stack produces a stable fingerprint ({} distinct values)",
                signal.distinct_values
            ),
        )
    };
    vec![check]
}

fn fonts(signal: &FontsSignal) -> Vec<Check> {
    let detected = signal.detected.len();
    let check = if detected > FONT_ENUMERATION_LIMIT {
        Check::new(
            CheckId::FontsEnumerable,
            Layer::Fonts,
            CheckStatus::Warn,
            format!("{} of {} probed fonts are detectable", detected, signal.tested),
        )
    } else {
        Check::new(
            CheckId::FontsEnumerable,
            Layer::Fonts,
            CheckStatus::Pass,
            format!("Only {} of {} probed fonts are detectable", detected, signal.tested),
        )
    };
    vec![check]
}

fn navigator(signal: &NavigatorSignal) -> Vec<Check> {
    let claimed = os_from_user_agent(&signal.user_agent);
    let actual = os_from_platform(&signal.platform);
    let check = match (claimed, actual) {
        (Some(claimed), Some(actual)) if !claimed.is_compatible_with(actual) => Check::new(
            CheckId::PlatformMismatch,
            Layer::Navigator,
            CheckStatus::Warn,
            format!(
                "User agent claims {} but navigator.platform reports {}",
                claimed.as_str(),
                actual.as_str()
            ),
        ),
        _ => Check::new(
            CheckId::PlatformMismatch,
            Layer::Navigator,
            CheckStatus::Pass,
            "User agent and platform agree",
        ),
    };
    vec![check]
}

fn locale(signal: &LocaleSignal, context: &ScoreContext) -> Vec<Check> {
    let mismatch = context.geolocation.as_ref().filter(|hint| {
        !hint.utc_offsets_minutes.is_empty()
            && !hint.utc_offsets_minutes.contains(&signal.utc_offset_minutes)
    });
    let check = match mismatch {
        Some(hint) => Check::new(
            CheckId::TimezoneMismatch,
            Layer::Locale,
            CheckStatus::Warn,
            format!(
                "Browser timezone ({}) does not match your location{}",
                format_offset(signal.utc_offset_minutes),
                hint.label
                    .as_ref()
                    .map(|l| format!(" ({})", l))
                    .unwrap_or_default()
            ),
        ),
        None => Check::new(
            CheckId::TimezoneMismatch,
            Layer::Locale,
            CheckStatus::Pass,
            "Timezone is consistent",
        ),
    };
    vec![check]
}

fn automation(signal: &AutomationSignal) -> Vec<Check> {
    let markers = signal.markers();
    let check = if markers.is_empty() {
        Check::new(
            CheckId::AutomationDetected,
            Layer::Automation,
            CheckStatus::Pass,
            "No automation markers found",
        )
    } else {
        Check::new(
            CheckId::AutomationDetected,
            Layer::Automation,
            CheckStatus::Fail,
            format!("Automation detected: {}", markers.join(", ")),
        )
    };
    vec![check]
}

/// `UTC+05:30` style
pub fn format_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let abs = minutes.unsigned_abs();
    format!("UTC{}{:02}:{:02}", sign, abs / 60, abs % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    MacOs,
    Ios,
    Android,
    ChromeOs,
    Linux,
}

impl OsFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Windows => "Windows",
            OsFamily::MacOs => "macOS",
            OsFamily::Ios => "iOS",
            OsFamily::Android => "Android",
            OsFamily::ChromeOs => "ChromeOS",
            OsFamily::Linux => "Linux",
        }
    }

    /// Android and ChromeOS report a Linux `navigator.platform`.
    pub fn is_compatible_with(&self, platform: OsFamily) -> bool {
        *self == platform
            || (matches!(self, OsFamily::Android | OsFamily::ChromeOs) && platform == OsFamily::Linux)
    }
}

/// OS family claimed by a user agent string. Order matters: iOS agents say
/// "like Mac OS X" and Android agents say "Linux".
pub fn os_from_user_agent(user_agent: &str) -> Option<OsFamily> {
    let ua = user_agent;
    if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        Some(OsFamily::Ios)
    } else if ua.contains("Android") {
        Some(OsFamily::Android)
    } else if ua.contains("CrOS") {
        Some(OsFamily::ChromeOs)
    } else if ua.contains("Windows") {
        Some(OsFamily::Windows)
    } else if ua.contains("Macintosh") || ua.contains("Mac OS X") {
        Some(OsFamily::MacOs)
    } else if ua.contains("Linux") || ua.contains("X11") {
        Some(OsFamily::Linux)
    } else {
        None
    }
}

/// OS family of a `navigator.platform` value.
pub fn os_from_platform(platform: &str) -> Option<OsFamily> {
    let p = platform.trim();
    if p.starts_with("Win") {
        Some(OsFamily::Windows)
    } else if p.starts_with("Mac") {
        Some(OsFamily::MacOs)
    } else if p.starts_with("iPhone") || p.starts_with("iPad") || p.starts_with("iPod") {
        Some(OsFamily::Ios)
    } else if p.starts_with("Android") {
        Some(OsFamily::Android)
    } else if p.starts_with("Linux") || p.contains("X11") {
        Some(OsFamily::Linux)
    } else {
        None
    }
}
