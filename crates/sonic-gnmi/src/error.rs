//! Error types for the gNMI client
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - SI-11: Error Handling - Structured error types with contextual information

use thiserror::Error;
use tonic::Code;

/// Errors raised by the gNMI transport and sample streams
#[derive(Debug, Error)]
pub enum GnmiError {
    /// The gRPC channel to the target could not be established
    #[error("Connect error: {0}")]
    Connect(String),

    /// The Subscribe RPC failed or was terminated with a status
    #[error("RPC error: {0}")]
    Rpc(#[from] tonic::Status),

    /// The target reported an in-band gNMI error
    #[error("Target error (code {code}): {message}")]
    Target { code: u32, message: String },

    /// A textual path could not be parsed
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Call metadata (credentials) could not be encoded
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// A typed value could not be decoded into the requested type
    #[error("Decode error: {0}")]
    Decode(String),

    /// The subscription was closed locally
    #[error("Subscription closed")]
    Closed,
}

impl GnmiError {
    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        GnmiError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error only signals that the stream ended.
    ///
    /// A cancelled RPC after a half-close and a locally closed subscription
    /// both end collection normally and are not failures.
    pub fn is_stream_closed(&self) -> bool {
        match self {
            GnmiError::Closed => true,
            GnmiError::Rpc(status) => status.code() == Code::Cancelled,
            _ => false,
        }
    }
}

/// Result type alias for gNMI operations
pub type Result<T> = std::result::Result<T, GnmiError>;
