//! In-memory credential and transport fakes shared by the unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::AuthError;
use crate::protocol::Packet;
use crate::session::transport::OpenedTransport;
use crate::session::{
    CredentialProvider, Endpoint, SelfState, SessionToken, Transport, TransportConfig,
    TransportEvent, TransportFactory,
};

#[derive(Default)]
pub(crate) struct FakeCredentials {
    calls: AtomicU32,
    failures: Mutex<VecDeque<AuthError>>,
}

impl FakeCredentials {
    pub(crate) fn push_failure(&self, err: AuthError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for FakeCredentials {
    fn get_token<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<SessionToken, AuthError>> + Send + 'a>> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(SessionToken::new(format!("fake-token-{n}"), None))
        })
    }
}

/// How the next opened transport behaves.
#[derive(Debug, Clone)]
pub(crate) enum Script {
    Ready,
    ReadyAfter(Vec<Packet>),
    Close(&'static str),
    Fail(&'static str),
    /// Opens but never emits anything.
    Silent,
}

#[derive(Default)]
struct Shared {
    sent: Mutex<Vec<Packet>>,
    opens: AtomicU32,
    closes: AtomicU32,
    current_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    self_state: Mutex<SelfState>,
    endpoints: Mutex<Vec<Endpoint>>,
    tokens: Mutex<Vec<String>>,
}

#[derive(Default)]
pub(crate) struct FakeTransportFactory {
    scripts: Mutex<VecDeque<Script>>,
    shared: Arc<Shared>,
}

impl FakeTransportFactory {
    pub(crate) fn push_script(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub(crate) fn inject(&self, event: TransportEvent) {
        let tx = self.shared.current_tx.lock().unwrap().clone();
        tx.expect("no transport opened")
            .try_send(event)
            .expect("event channel full or closed");
    }

    pub(crate) fn inject_packet(&self, kind: &str, payload: serde_json::Value) {
        self.inject(TransportEvent::Message(Packet {
            kind: kind.to_string(),
            payload,
        }));
    }

    pub(crate) fn set_self_state(&self, state: SelfState) {
        *self.shared.self_state.lock().unwrap() = state;
    }

    pub(crate) fn sent(&self) -> Vec<Packet> {
        self.shared.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_kinds(&self) -> Vec<String> {
        self.sent().into_iter().map(|p| p.kind).collect()
    }

    pub(crate) fn sent_chat(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|p| p.kind == crate::protocol::TEXT)
            .filter_map(|p| {
                p.payload
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .collect()
    }

    pub(crate) fn open_count(&self) -> u32 {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn close_count(&self) -> u32 {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn endpoints(&self) -> Vec<Endpoint> {
        self.shared.endpoints.lock().unwrap().clone()
    }

    pub(crate) fn tokens(&self) -> Vec<String> {
        self.shared.tokens.lock().unwrap().clone()
    }
}

struct FakeTransport {
    shared: Arc<Shared>,
}

impl Transport for FakeTransport {
    fn send(&self, packet: Packet) -> anyhow::Result<()> {
        self.shared.sent.lock().unwrap().push(packet);
        Ok(())
    }

    fn self_state(&self) -> SelfState {
        *self.shared.self_state.lock().unwrap()
    }

    fn close<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.shared.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

impl TransportFactory for FakeTransportFactory {
    fn open<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        token: &'a SessionToken,
        _config: &'a TransportConfig,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<OpenedTransport>> + Send + 'a>> {
        Box::pin(async move {
            self.shared.opens.fetch_add(1, Ordering::SeqCst);
            self.shared.endpoints.lock().unwrap().push(endpoint.clone());
            self.shared
                .tokens
                .lock()
                .unwrap()
                .push(token.secret().to_string());

            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::Ready);

            let (tx, rx) = mpsc::channel(64);
            match script {
                Script::Ready => tx.try_send(TransportEvent::Ready)?,
                Script::ReadyAfter(packets) => {
                    for p in packets {
                        tx.try_send(TransportEvent::Message(p))?;
                    }
                    tx.try_send(TransportEvent::Ready)?;
                }
                Script::Close(reason) => tx.try_send(TransportEvent::Closed {
                    reason: reason.to_string(),
                })?,
                Script::Fail(error) => tx.try_send(TransportEvent::Failed {
                    error: error.to_string(),
                })?,
                Script::Silent => {}
            }
            *self.shared.current_tx.lock().unwrap() = Some(tx);

            Ok(OpenedTransport {
                transport: Box::new(FakeTransport {
                    shared: self.shared.clone(),
                }),
                events: rx,
            })
        })
    }
}
