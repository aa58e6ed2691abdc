use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use super::{Endpoint, SessionToken};
use crate::protocol::{Packet, Vec3};

/// Lifecycle and data events emitted by a transport, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The session is spawned and usable.
    Ready,
    Message(Packet),
    Closed { reason: String },
    Failed { error: String },
}

/// Live self-state the transport keeps current while open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SelfState {
    /// Stable per-session identity of our own entity (0 until ready).
    pub runtime_id: u64,
    pub position: Vec3,
    /// Facing, in degrees.
    pub yaw: f32,
}

/// Options handed to the transport when a session is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub username: String,
    pub protocol_version: String,
    pub skip_ping: bool,
    pub offline: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            username: "Aika".to_string(),
            protocol_version: "1.21.111".to_string(),
            skip_ping: true,
            offline: false,
        }
    }
}

/// One live channel to a remote endpoint.
pub trait Transport: Send {
    /// Queues a packet for sending. Fails once the channel is gone.
    fn send(&self, packet: Packet) -> anyhow::Result<()>;

    fn self_state(&self) -> SelfState;

    fn close<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// A freshly opened transport plus the receiving end of its event stream.
pub struct OpenedTransport {
    pub transport: Box<dyn Transport>,
    pub events: mpsc::Receiver<TransportEvent>,
}

pub trait TransportFactory: Send + Sync {
    fn open<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        token: &'a SessionToken,
        config: &'a TransportConfig,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<OpenedTransport>> + Send + 'a>>;
}
