//! Remediation advice for failing and warning checks

use std::collections::BTreeSet;

use super::rules::{Check, CheckId, CheckStatus};

/// Fixed remediation text for a check.
pub fn recommendation_for(id: CheckId) -> &'static str {
    match id {
        CheckId::WebrtcLeak => {
            "Disable WebRTC or restrict it to proxied connections (e.g. \
             media.peerconnection.enabled = false in Firefox, or a WebRTC leak \
             blocking extension) so STUN requests cannot reveal your IP address."
        }
        CheckId::CanvasUnprotected => {
            "Use a browser with canvas fingerprinting protection (Tor Browser, \
             Brave, Firefox with privacy.resistFingerprinting) or a canvas \
             randomization extension."
        }
        CheckId::WebglRendererExposed => {
            "Block the WEBGL_debug_renderer_info extension or disable WebGL to \
             hide your exact GPU model."
        }
        CheckId::AudioUnprotected => {
            "Enable audio fingerprinting protection (Brave shields, Firefox \
             resistFingerprinting) to mask the AudioContext output."
        }
        CheckId::FontsEnumerable => {
            "Restrict font visibility to a standard set (Firefox \
             layout.css.font-visibility, Tor Browser) or uninstall rarely used \
             fonts."
        }
        CheckId::PlatformMismatch => {
            "Your user agent does not match your real platform. Spoofed user \
             agents stand out; prefer a browser whose defaults blend in."
        }
        CheckId::TimezoneMismatch => {
            "Set your system timezone to match your apparent location, or use \
             a browser that reports UTC to every site."
        }
        CheckId::AutomationDetected => {
            "Automation markers are exposed. If this is not an automated \
             browser, check for developer tools or extensions that enable \
             remote control."
        }
    }
}

/// One recommendation per distinct non-passing check id, in first-appearance
/// order of `checks`.
pub fn recommendations<'a>(checks: impl IntoIterator<Item = &'a Check>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    checks
        .into_iter()
        .filter(|check| check.status != CheckStatus::Pass)
        .filter(|check| seen.insert(check.id))
        .map(|check| recommendation_for(check.id).to_string())
        .collect()
}
