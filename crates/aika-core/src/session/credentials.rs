use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

use crate::error::AuthError;

/// Opaque credential for one connection attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    expires_at: Option<SystemTime>,
}

impl SessionToken {
    pub fn new(value: impl Into<String>, expires_at: Option<SystemTime>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Produces a usable session token, or fails. Called once per connection attempt.
pub trait CredentialProvider: Send + Sync {
    fn get_token<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<SessionToken, AuthError>> + Send + 'a>>;
}
