// Client-side API error types
use thiserror::Error;

pub const DEFAULT_UNAUTHENTICATED_MESSAGE: &str = "Please log in first";
pub const DEFAULT_FORBIDDEN_MESSAGE: &str = "Permission denied";
pub const DEFAULT_SERVER_FAULT_MESSAGE: &str = "Please try again later";
pub const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";
pub const DEFAULT_NETWORK_MESSAGE: &str = "Network error";

/// Outcome of a failed call as seen by the caller.
///
/// Authentication failures that the session coordinator recovers from are
/// never returned; `Unauthenticated` is the terminal form, raised only when
/// recovery was impossible or already attempted.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // 401 after recovery was attempted, or with no way to recover
    #[error("{0}")]
    Unauthenticated(String),

    // 403
    #[error("{0}")]
    PermissionDenied(String),

    // HTTP 500 or envelope code 500
    #[error("{0}")]
    ServerFault(String),

    // Any other non-success envelope or status
    #[error("{message}")]
    RequestFailed { code: Option<i64>, message: String },

    // No response received
    #[error("{0}")]
    NetworkUnreachable(String),

    // Response arrived but the payload did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // The client itself could not be constructed or a request could not be built
    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl ApiError {
    /// HTTP-equivalent status code, when the failure maps onto one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Unauthenticated(_) => Some(401),
            ApiError::PermissionDenied(_) => Some(403),
            ApiError::ServerFault(_) => Some(500),
            ApiError::RequestFailed { code, .. } => code.and_then(|c| u16::try_from(c).ok()),
            ApiError::NetworkUnreachable(_) => None,
            ApiError::InvalidResponse(_) => None,
            ApiError::Configuration(_) => None,
        }
    }

    /// Human-readable message suitable for the user
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated(msg) => msg,
            ApiError::PermissionDenied(msg) => msg,
            ApiError::ServerFault(msg) => msg,
            ApiError::RequestFailed { message, .. } => message,
            ApiError::NetworkUnreachable(msg) => msg,
            ApiError::InvalidResponse(msg) => msg,
            ApiError::Configuration(msg) => msg,
        }
    }

    /// Stable error code for machine-readable output
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::PermissionDenied(_) => "PERMISSION_DENIED",
            ApiError::ServerFault(_) => "SERVER_FAULT",
            ApiError::RequestFailed { .. } => "REQUEST_FAILED",
            ApiError::NetworkUnreachable(_) => "NETWORK_UNREACHABLE",
            ApiError::InvalidResponse(_) => "INVALID_RESPONSE",
            ApiError::Configuration(_) => "CONFIGURATION",
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ApiError::Unauthenticated(_))
    }

    /// Failures where the server never gave a verdict on the request.
    /// Gateway statuses count: the upstream service was not reached.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::NetworkUnreachable(_)
                | ApiError::ServerFault(_)
                | ApiError::RequestFailed {
                    code: Some(502..=504),
                    ..
                }
        )
    }
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        ApiError::PermissionDenied(message.into())
    }

    pub fn server_fault(message: impl Into<String>) -> Self {
        ApiError::ServerFault(message.into())
    }

    pub fn request_failed(code: Option<i64>, message: impl Into<String>) -> Self {
        ApiError::RequestFailed {
            code,
            message: message.into(),
        }
    }

    pub fn network_unreachable(message: impl Into<String>) -> Self {
        ApiError::NetworkUnreachable(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        ApiError::InvalidResponse(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ApiError::Configuration(message.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_response(err.to_string())
    }
}
