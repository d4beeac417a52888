//! Error types for gateway operations.
//!
//! Every failure the remote state gateway can report is folded into
//! [`GatewayError`], which carries a stable numeric code for hosts that
//! bridge errors across a boundary and a retry classification used by the
//! sync engine when deciding whether a failure is transient.

/// Error codes for host integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GatewayErrorCode {
    /// Feature not compiled in
    Unimplemented = 1000,
    /// Transport/network layer error
    Transport = 2000,
    /// Connection failed
    ConnectionFailed = 2001,
    /// Request timed out
    Timeout = 2002,
    /// Session expired on the server
    SessionExpired = 3001,
    /// Session torn down locally
    SessionClosed = 3002,
    /// Payload failed boundary validation
    InvalidData = 5000,
    /// Serialization error
    Serialization = 5002,
    /// Purchase or extend rejected
    Rejected = 6003,
    /// Rate limited
    RateLimited = 8000,
    /// Server-side failure
    Server = 9000,
}

/// Comprehensive error type for gateway operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Feature not compiled in.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    /// Transport/network layer error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Connection to the backend failed.
    #[error("connection to {target} failed: {reason}")]
    ConnectionFailed {
        /// Target URL or service
        target: String,
        /// Underlying error message
        reason: String,
    },

    /// Request timed out.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Server says the session is no longer valid.
    #[error("session expired")]
    SessionExpired,

    /// The session was torn down locally (logout).
    #[error("session is closed")]
    SessionClosed,

    /// Purchase or extend request rejected by the server.
    #[error("request rejected: {message}")]
    Rejected {
        /// User-facing message from the server
        message: String,
    },

    /// Payload failed validation at the boundary.
    #[error("invalid {field}: {reason}")]
    InvalidData {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Rate limited, retry after a delay.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds
        retry_after_ms: u64,
    },

    /// Server-side failure.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },
}

impl GatewayError {
    /// Get the error code for host integration.
    pub fn code(&self) -> GatewayErrorCode {
        match self {
            Self::Unimplemented(_) => GatewayErrorCode::Unimplemented,
            Self::Transport(_) => GatewayErrorCode::Transport,
            Self::ConnectionFailed { .. } => GatewayErrorCode::ConnectionFailed,
            Self::Timeout { .. } => GatewayErrorCode::Timeout,
            Self::SessionExpired => GatewayErrorCode::SessionExpired,
            Self::SessionClosed => GatewayErrorCode::SessionClosed,
            Self::Rejected { .. } => GatewayErrorCode::Rejected,
            Self::InvalidData { .. } => GatewayErrorCode::InvalidData,
            Self::Serialization(_) => GatewayErrorCode::Serialization,
            Self::RateLimited { .. } => GatewayErrorCode::RateLimited,
            Self::Server { .. } => GatewayErrorCode::Server,
        }
    }

    /// User-facing message. For rejections this is the server's message verbatim.
    pub fn message(&self) -> String {
        match self {
            Self::Rejected { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if the next scheduled sync may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::Server { .. }
        )
    }

    /// Returns a suggested retry delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            Self::Timeout { .. } => Some(1000),
            Self::ConnectionFailed { .. } => Some(2000),
            Self::Transport(_) | Self::Server { .. } => Some(1000),
            _ => None,
        }
    }

    /// Create a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidData {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}
