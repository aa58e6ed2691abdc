//! Transport over a protocol bridge sidecar that speaks the game protocol for us.
//!
//! One TCP connection per session, newline-delimited JSON both ways:
//!
//! ```text
//! -> {"op":"open","host":..,"port":..,"token":..,"username":..,"protocol_version":..,"skip_ping":..,"offline":..}
//! <- {"event":"ready","runtime_id":1,"position":{..},"yaw":0.0}
//! <- {"event":"message","kind":"text","payload":{..}}
//! -> {"op":"send","kind":"move_player","payload":{..}}
//! -> {"op":"close"}
//! <- {"event":"closed","reason":".."} | {"event":"failed","error":".."}
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use aika_core::protocol::{MOVE_ENTITY, MOVE_PLAYER, Packet, Vec3};
use aika_core::session::transport::OpenedTransport;
use aika_core::session::{
    Endpoint, SelfState, SessionToken, Transport, TransportConfig, TransportEvent,
    TransportFactory,
};

const EVENT_BUFFER: usize = 256;
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest {
    Open {
        host: String,
        port: u16,
        token: String,
        username: String,
        protocol_version: String,
        skip_ping: bool,
        offline: bool,
    },
    Send {
        kind: String,
        payload: serde_json::Value,
    },
    Close,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum BridgeEvent {
    Ready {
        runtime_id: u64,
        #[serde(default)]
        position: Vec3,
        #[serde(default)]
        yaw: f32,
    },
    Message {
        kind: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    Closed {
        #[serde(default)]
        reason: String,
    },
    Failed {
        error: String,
    },
}

/// Opens one bridge connection per session.
#[derive(Debug, Clone)]
pub struct LineBridgeFactory {
    bridge_addr: String,
}

impl LineBridgeFactory {
    pub fn new(bridge_addr: impl Into<String>) -> Self {
        Self {
            bridge_addr: bridge_addr.into(),
        }
    }
}

impl TransportFactory for LineBridgeFactory {
    fn open<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        token: &'a SessionToken,
        config: &'a TransportConfig,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<OpenedTransport>> + Send + 'a>> {
        Box::pin(async move {
            let stream = TcpStream::connect(&self.bridge_addr)
                .await
                .with_context(|| format!("connect bridge {}", self.bridge_addr))?;
            let (read, mut write) = stream.into_split();

            let open = BridgeRequest::Open {
                host: endpoint.host.clone(),
                port: endpoint.port,
                token: token.secret().to_string(),
                username: config.username.clone(),
                protocol_version: config.protocol_version.clone(),
                skip_ping: config.skip_ping,
                offline: config.offline,
            };
            write_line(&mut write, &open).await.context("bridge open")?;
            debug!(bridge = %self.bridge_addr, endpoint = %endpoint, "bridge.open");

            let me = Arc::new(Mutex::new(SelfState::default()));
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

            let writer = tokio::spawn(write_loop(write, out_rx));
            let reader = tokio::spawn(read_loop(read, event_tx, me.clone()));

            Ok(OpenedTransport {
                transport: Box::new(LineTransport {
                    out_tx,
                    me,
                    writer: Some(writer),
                    reader,
                }),
                events: event_rx,
            })
        })
    }
}

pub struct LineTransport {
    out_tx: mpsc::UnboundedSender<BridgeRequest>,
    me: Arc<Mutex<SelfState>>,
    writer: Option<JoinHandle<()>>,
    reader: JoinHandle<()>,
}

impl Transport for LineTransport {
    fn send(&self, packet: Packet) -> anyhow::Result<()> {
        if packet.kind == MOVE_PLAYER {
            track_self_move(&self.me, &packet.payload);
        }
        self.out_tx
            .send(BridgeRequest::Send {
                kind: packet.kind,
                payload: packet.payload,
            })
            .map_err(|_| anyhow::anyhow!("bridge connection closed"))
    }

    fn self_state(&self) -> SelfState {
        self.me.lock().map(|s| *s).unwrap_or_default()
    }

    fn close<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            // Queued sends go out before the close request.
            let _ = self.out_tx.send(BridgeRequest::Close);
            if let Some(writer) = self.writer.take()
                && tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, writer).await.is_err()
            {
                warn!("bridge.close.flush_timeout");
            }
            self.reader.abort();
            Ok(())
        })
    }
}

impl Drop for LineTransport {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

async fn write_line(write: &mut OwnedWriteHalf, req: &BridgeRequest) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(req).context("encode bridge request")?;
    line.push('\n');
    write
        .write_all(line.as_bytes())
        .await
        .context("bridge write")?;
    write.flush().await.ok();
    Ok(())
}

async fn write_loop(mut write: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<BridgeRequest>) {
    while let Some(req) = rx.recv().await {
        let closing = matches!(req, BridgeRequest::Close);
        if let Err(err) = write_line(&mut write, &req).await {
            warn!(error = %format!("{err:#}"), "bridge.write.failed");
            return;
        }
        if closing {
            let _ = write.shutdown().await;
            return;
        }
    }
}

async fn read_loop(
    read: OwnedReadHalf,
    events: mpsc::Sender<TransportEvent>,
    me: Arc<Mutex<SelfState>>,
) {
    let mut reader = BufReader::new(read);
    let mut line = String::new();
    loop {
        line.clear();
        let event = match reader.read_line(&mut line).await {
            Ok(0) => TransportEvent::Closed {
                reason: "bridge closed the connection".to_string(),
            },
            Ok(_) => {
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                match serde_json::from_str::<BridgeEvent>(text) {
                    Ok(event) => translate(event, &me),
                    Err(err) => {
                        warn!(error = %err, "bridge.event.malformed");
                        continue;
                    }
                }
            }
            Err(err) => TransportEvent::Failed {
                error: format!("bridge read: {err}"),
            },
        };

        let terminal = matches!(
            event,
            TransportEvent::Closed { .. } | TransportEvent::Failed { .. }
        );
        if events.send(event).await.is_err() || terminal {
            return;
        }
    }
}

fn translate(event: BridgeEvent, me: &Mutex<SelfState>) -> TransportEvent {
    match event {
        BridgeEvent::Ready {
            runtime_id,
            position,
            yaw,
        } => {
            if let Ok(mut s) = me.lock() {
                *s = SelfState {
                    runtime_id,
                    position,
                    yaw,
                };
            }
            TransportEvent::Ready
        }
        BridgeEvent::Message { kind, payload } => {
            if kind == MOVE_PLAYER || kind == MOVE_ENTITY {
                track_self_move(me, &payload);
            }
            TransportEvent::Message(Packet { kind, payload })
        }
        BridgeEvent::Closed { reason } => TransportEvent::Closed { reason },
        BridgeEvent::Failed { error } => TransportEvent::Failed { error },
    }
}

/// Keeps our own position current from moves that name our runtime id.
fn track_self_move(me: &Mutex<SelfState>, payload: &serde_json::Value) {
    let Ok(mut s) = me.lock() else {
        return;
    };
    let id = payload.get("runtime_id").and_then(|v| v.as_u64());
    if s.runtime_id == 0 || id != Some(s.runtime_id) {
        return;
    }
    if let Some(pos) = payload
        .get("position")
        .and_then(|p| serde_json::from_value::<Vec3>(p.clone()).ok())
    {
        s.position = pos;
    }
    if let Some(yaw) = payload.get("yaw").and_then(|v| v.as_f64()) {
        s.yaw = yaw as f32;
    }
}
