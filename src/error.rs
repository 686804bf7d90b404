//! Error types for the trackability scanner
//!
//! Probe failures never reach the caller as errors: collectors and the
//! orchestrator fold them into "unavailable" layer readings. The variants
//! below cover what *can* surface: bad weight profiles, bad scan options,
//! and (de)serialization failures at the JavaScript boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, ScanError>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Probe errors (1xx)
    CapabilityMissing = 100,
    ProbeTimeout = 101,
    ProbeFailed = 102,

    // Configuration errors (2xx)
    InvalidWeights = 200,
    InvalidConfig = 201,
    UnknownPreset = 202,
    DuplicatePreset = 203,

    // Boundary errors (3xx)
    SerializationError = 300,

    // Internal errors (9xx)
    InternalError = 900,
}

/// Main error type for the scanner
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    // ===== Probe Errors =====
    #[error("Capability missing: {0}")]
    CapabilityMissing(String),

    #[error("Probe timed out after {0} ms")]
    Timeout(u64),

    #[error("Probe failed: {0}")]
    Probe(String),

    // ===== Configuration Errors =====
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Unknown weight preset: {0}")]
    UnknownPreset(String),

    #[error("Duplicate weight preset: {0}")]
    DuplicatePreset(String),

    // ===== Boundary Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Wrap a thrown JS value as a probe failure.
    pub fn from_js(context: &str, value: JsValue) -> Self {
        let detail = value
            .as_string()
            .or_else(|| {
                js_sys::Reflect::get(&value, &JsValue::from_str("message"))
                    .ok()
                    .and_then(|m| m.as_string())
            })
            .unwrap_or_else(|| format!("{:?}", value));
        ScanError::Probe(format!("{}: {}", context, detail))
    }

    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            ScanError::CapabilityMissing(_) => ErrorCode::CapabilityMissing,
            ScanError::Timeout(_) => ErrorCode::ProbeTimeout,
            ScanError::Probe(_) => ErrorCode::ProbeFailed,
            ScanError::InvalidWeights(_) => ErrorCode::InvalidWeights,
            ScanError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            ScanError::UnknownPreset(_) => ErrorCode::UnknownPreset,
            ScanError::DuplicatePreset(_) => ErrorCode::DuplicatePreset,
            ScanError::Serialization(_) => ErrorCode::SerializationError,
            ScanError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the orchestrator absorbs this error into an "unavailable"
    /// layer reading instead of surfacing it.
    pub fn is_probe_error(&self) -> bool {
        matches!(
            self,
            ScanError::CapabilityMissing(_) | ScanError::Timeout(_) | ScanError::Probe(_)
        )
    }

    /// Whether this error requires the caller to change its input
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidWeights(_)
                | ScanError::InvalidConfig(_)
                | ScanError::UnknownPreset(_)
                | ScanError::DuplicatePreset(_)
                | ScanError::Serialization(_)
        )
    }

    /// Get a user-friendly message for display
    pub fn user_message(&self) -> String {
        match self {
            ScanError::CapabilityMissing(_) => {
                "Your browser does not expose this feature, so it could not be tested.".into()
            }
            ScanError::Timeout(_) => "This test took too long and was skipped.".into(),
            ScanError::Probe(_) => "This test failed to run in your browser.".into(),
            ScanError::InvalidWeights(_) => {
                "The scoring profile is invalid. Weights must be non-negative numbers.".into()
            }
            ScanError::InvalidConfig(_) => {
                "The scan options are invalid. Please check your settings.".into()
            }
            ScanError::UnknownPreset(id) => format!("No scoring profile named '{}' exists.", id),
            ScanError::DuplicatePreset(id) => {
                format!("A scoring profile named '{}' already exists.", id)
            }
            ScanError::Serialization(_) => "Failed to read the supplied data.".into(),
            ScanError::Internal(_) => "An internal error occurred. Please report this bug.".into(),
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Serialization(err.to_string())
    }
}

impl From<serde_wasm_bindgen::Error> for ScanError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        ScanError::Serialization(err.to_string())
    }
}

impl From<ScanError> for JsValue {
    fn from(err: ScanError) -> Self {
        let info = ErrorInfo::from(&err);
        serde_wasm_bindgen::to_value(&info).unwrap_or_else(|_| JsValue::from_str(&err.to_string()))
    }
}

/// Error information for JavaScript consumption
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
    pub user_message: String,
    pub requires_user_action: bool,
}

impl From<&ScanError> for ErrorInfo {
    fn from(err: &ScanError) -> Self {
        ErrorInfo {
            code: err.code() as u32,
            message: err.to_string(),
            user_message: err.user_message(),
            requires_user_action: err.requires_user_action(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_errors() {
        assert!(ScanError::CapabilityMissing("RTCPeerConnection".into()).is_probe_error());
        assert!(ScanError::Timeout(3000).is_probe_error());
        assert!(ScanError::Probe("boom".into()).is_probe_error());

        assert!(!ScanError::InvalidWeights("negative".into()).is_probe_error());
        assert!(!ScanError::Serialization("bad json".into()).is_probe_error());
    }

    #[test]
    fn test_user_action_errors() {
        assert!(ScanError::InvalidWeights("x".into()).requires_user_action());
        assert!(ScanError::UnknownPreset("x".into()).requires_user_action());
        assert!(!ScanError::Timeout(10).requires_user_action());
        assert!(!ScanError::Internal("x".into()).requires_user_action());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ScanError::Timeout(1).code(), ErrorCode::ProbeTimeout);
        assert_eq!(
            ScanError::InvalidWeights("x".into()).code(),
            ErrorCode::InvalidWeights
        );
        assert_eq!(ErrorInfo::from(&ScanError::Internal("x".into())).code, 900);
    }

    #[test]
    fn test_json_errors_convert() {
        let err: ScanError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.code(), ErrorCode::SerializationError);
    }
}
