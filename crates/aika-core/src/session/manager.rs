use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use super::transport::OpenedTransport;
use super::{
    CredentialProvider, Endpoint, SelfState, Transport, TransportConfig, TransportEvent,
    TransportFactory,
};
use crate::error::{AttemptFailure, ConnectionError};
use crate::protocol::{OutboundMessage, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Budget for one attempt (token + open + wait for ready). Not cumulative.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failed_attempt`-th failure (1-based): `min(base * 2^(n-1), max)`.
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(31);
        self.base_backoff
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// The one live transport. Dropped as soon as it reports closed or failed.
pub struct ConnectionHandle {
    endpoint: Endpoint,
    generation: u64,
    transport: Box<dyn Transport>,
    events: mpsc::Receiver<TransportEvent>,
    backlog: VecDeque<Packet>,
}

impl ConnectionHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Increases with every successful connect; lets owners detect a fresh session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn self_state(&self) -> SelfState {
        self.transport.self_state()
    }

    pub fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()> {
        self.transport.send(msg.to_packet())
    }
}

/// What the active session produced next.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Packet(Packet),
    /// A spawn signal after the initial ready (e.g. respawn).
    Spawned,
    /// The handle was invalidated; no further events follow.
    Ended { reason: String },
}

pub struct SessionManager {
    credentials: Arc<dyn CredentialProvider>,
    transports: Arc<dyn TransportFactory>,
    transport_config: TransportConfig,
    policy: RetryPolicy,
    active: Option<ConnectionHandle>,
    generation: u64,
}

impl SessionManager {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        transports: Arc<dyn TransportFactory>,
        transport_config: TransportConfig,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            credentials,
            transports,
            transport_config,
            policy,
            active: None,
            generation: 0,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn active(&self) -> Option<&ConnectionHandle> {
        self.active.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    /// Connects to `endpoint`, tearing down any active handle first.
    ///
    /// Returns the generation of the new session once the transport reports ready.
    pub async fn connect(
        &mut self,
        endpoint: &Endpoint,
        max_retries: u32,
    ) -> Result<u64, ConnectionError> {
        self.disconnect().await;

        let max_retries = max_retries.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            info!(endpoint = %endpoint, attempt, max_retries, "session.connect.attempt");

            match self.attempt(endpoint).await {
                Ok(mut handle) => {
                    self.generation += 1;
                    handle.generation = self.generation;
                    info!(
                        endpoint = %endpoint,
                        attempt,
                        generation = self.generation,
                        "session.connect.ready"
                    );
                    self.active = Some(handle);
                    return Ok(self.generation);
                }
                Err(reason) => {
                    warn!(endpoint = %endpoint, attempt, error = %reason, "session.connect.failed");
                    if attempt >= max_retries {
                        warn!(endpoint = %endpoint, attempts = attempt, "session.connect.exhausted");
                        return Err(ConnectionError {
                            endpoint: endpoint.clone(),
                            reason,
                            attempts_exhausted: attempt,
                        });
                    }
                    let delay = self.policy.backoff_for(attempt);
                    info!(delay_ms = delay.as_millis() as u64, "session.connect.backoff");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Tears down the active handle (if any), then connects with the configured retry count.
    pub async fn reconnect(&mut self, endpoint: &Endpoint) -> Result<u64, ConnectionError> {
        let max_retries = self.policy.max_retries;
        self.connect(endpoint, max_retries).await
    }

    /// Best-effort close of the active handle. Teardown errors are swallowed.
    pub async fn disconnect(&mut self) {
        let Some(mut handle) = self.active.take() else {
            return;
        };
        if let Err(err) = handle.transport.close().await {
            debug!(endpoint = %handle.endpoint, error = %format!("{err:#}"), "session.close.error");
        }
        info!(endpoint = %handle.endpoint, generation = handle.generation, "session.closed");
    }

    /// Waits for the next event of the active session. `None` when nothing is connected.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let handle = self.active.as_mut()?;
        if let Some(packet) = handle.backlog.pop_front() {
            return Some(SessionEvent::Packet(packet));
        }

        let ended = match handle.events.recv().await {
            Some(TransportEvent::Message(packet)) => return Some(SessionEvent::Packet(packet)),
            Some(TransportEvent::Ready) => return Some(SessionEvent::Spawned),
            Some(TransportEvent::Closed { reason }) => reason,
            Some(TransportEvent::Failed { error }) => format!("transport failure: {error}"),
            None => "transport event stream ended".to_string(),
        };

        if let Some(handle) = self.active.take() {
            info!(endpoint = %handle.endpoint, reason = %ended, "session.ended");
        }
        Some(SessionEvent::Ended { reason: ended })
    }

    async fn attempt(&self, endpoint: &Endpoint) -> Result<ConnectionHandle, AttemptFailure> {
        let budget = self.policy.attempt_timeout;
        let deadline = Instant::now() + budget;

        // Fresh token every attempt; auth state may have changed since the last one.
        let token = timeout_at(deadline, self.credentials.get_token())
            .await
            .map_err(|_| AttemptFailure::Timeout(budget))??;

        let OpenedTransport {
            mut transport,
            mut events,
        } = timeout_at(
            deadline,
            self.transports
                .open(endpoint, &token, &self.transport_config),
        )
        .await
        .map_err(|_| AttemptFailure::Timeout(budget))?
        .map_err(|err| AttemptFailure::Transport(format!("{err:#}")))?;

        let mut backlog = VecDeque::new();
        let waited = timeout_at(deadline, async {
            loop {
                match events.recv().await {
                    Some(TransportEvent::Ready) => return Ok(()),
                    Some(TransportEvent::Message(packet)) => backlog.push_back(packet),
                    Some(TransportEvent::Closed { reason }) => {
                        return Err(AttemptFailure::Closed(reason));
                    }
                    Some(TransportEvent::Failed { error }) => {
                        return Err(AttemptFailure::Transport(error));
                    }
                    None => {
                        return Err(AttemptFailure::Closed(
                            "transport event stream ended".to_string(),
                        ));
                    }
                }
            }
        })
        .await
        .unwrap_or(Err(AttemptFailure::Timeout(budget)));

        if let Err(reason) = waited {
            if let Err(err) = transport.close().await {
                debug!(endpoint = %endpoint, error = %format!("{err:#}"), "session.close.error");
            }
            return Err(reason);
        }

        Ok(ConnectionHandle {
            endpoint: endpoint.clone(),
            generation: 0,
            transport,
            events,
            backlog,
        })
    }
}
