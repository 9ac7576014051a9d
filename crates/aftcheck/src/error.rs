//! Error types for aftcheck
//!
//! Only failures to reach the target or to read inputs are errors. A
//! failing validation is an ordinary [`ValidationOutcome`](crate::validate::ValidationOutcome).
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-11: Error Handling - Structured error types with contextual information

use thiserror::Error;

/// AFT check errors
#[derive(Debug, Error)]
pub enum AftCheckError {
    /// Telemetry transport error
    #[error("gNMI error: {0}")]
    Gnmi(#[from] sonic_gnmi::GnmiError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON input or output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Validation mode name not recognized
    #[error("Unknown validation mode {0:?} (expected exact, increment or transit)")]
    UnknownValidationMode(String),
}

impl AftCheckError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        AftCheckError::Config(msg.into())
    }
}

/// Result type for aftcheck operations
pub type Result<T> = std::result::Result<T, AftCheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AftCheckError::config("queue_capacity must be > 0");
        assert_eq!(
            err.to_string(),
            "Configuration error: queue_capacity must be > 0"
        );
    }

    #[test]
    fn test_unknown_mode_display() {
        let err = AftCheckError::UnknownValidationMode("exakt".to_string());
        assert!(err.to_string().contains("\"exakt\""));
    }

    #[test]
    fn test_gnmi_error_conversion() {
        let err: AftCheckError = sonic_gnmi::GnmiError::Closed.into();
        assert!(matches!(err, AftCheckError::Gnmi(_)));
    }
}
