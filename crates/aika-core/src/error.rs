use std::time::Duration;

use thiserror::Error;

use crate::session::Endpoint;

/// Failure reported by a credential provider. No retry happens inside the provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid or expired credentials: {0}")]
    InvalidCredentials(String),
    #[error("network failure during authentication: {0}")]
    Network(String),
    #[error("authentication misconfigured: {0}")]
    Misconfigured(String),
}

impl AuthError {
    /// Operator-facing guidance printed next to the error.
    pub fn operator_hint(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials(_) => {
                "Please check your account credentials or re-authenticate."
            }
            AuthError::Network(_) => {
                "Network issue during authentication. Please check your internet connection."
            }
            AuthError::Misconfigured(_) => {
                "Authentication configuration error. Please ensure you have the correct auth setup."
            }
        }
    }
}

/// Why a single connection attempt did not reach the ready state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),
    #[error("disconnected: {0}")]
    Closed(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("connect to {endpoint} failed after {attempts_exhausted} attempt(s): {reason}")]
pub struct ConnectionError {
    pub endpoint: Endpoint,
    /// Failure of the last attempt.
    pub reason: AttemptFailure,
    pub attempts_exhausted: u32,
}

/// An inbound payload that could not be decoded. Logged and dropped, never fatal.
#[derive(Debug, Error)]
#[error("malformed `{kind}` payload: {source}")]
pub struct ProtocolEventError {
    pub kind: String,
    #[source]
    pub source: serde_json::Error,
}
