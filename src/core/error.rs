//! Unified error handling for nsgate
//!
//! Every failure the gateway can surface to a client is one of these
//! variants. The HTTP status a variant maps to is part of its contract.

use std::fmt;

use http::StatusCode;

#[derive(Debug)]
pub enum GatewayError {
    /// The orchestrator has no app or group at the requested path
    NotFound(String),

    /// Transport failure, timeout or unexpected orchestrator status
    Upstream(String),

    /// Unparseable inbound body or missing required identifier
    MalformedBody(String),

    /// Authentication/authorization failures raised by the identity layer
    Unauthorized(String),

    /// Configuration-related errors
    Configuration(String),

    /// Internal system errors (filter failures, broken invariants)
    Internal(String),
}

impl GatewayError {
    /// HTTP status presented to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Configuration(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message without the variant prefix, used in client-facing bodies.
    pub fn message(&self) -> &str {
        match self {
            GatewayError::NotFound(msg)
            | GatewayError::Upstream(msg)
            | GatewayError::MalformedBody(msg)
            | GatewayError::Unauthorized(msg)
            | GatewayError::Configuration(msg)
            | GatewayError::Internal(msg) => msg,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::NotFound(msg) => write!(f, "Resource not found: {msg}"),
            GatewayError::Upstream(msg) => write!(f, "Upstream unavailable: {msg}"),
            GatewayError::MalformedBody(msg) => write!(f, "Malformed request body: {msg}"),
            GatewayError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            GatewayError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            GatewayError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::MalformedBody(err.to_string())
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> GatewayResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> GatewayResult<T> {
        self.map_err(|e| GatewayError::Internal(format!("{context}: {e}")))
    }
}
