//! Connection lifecycle: credentials, the transport seam and the session manager.

pub mod credentials;
pub mod manager;
pub mod transport;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use credentials::{CredentialProvider, SessionToken};
pub use manager::{ConnectionHandle, RetryPolicy, SessionEvent, SessionManager};
pub use transport::{SelfState, Transport, TransportConfig, TransportEvent, TransportFactory};

/// Well-known default port of the game protocol.
pub const DEFAULT_PORT: u16 = 19132;

/// Remote session target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
