// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session transport: one duplex WebSocket channel to the control
//! plane, driven by five concurrent, independently-cancellable loops
//! sharing one [`CancellationToken`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use nspass_core::SharedClock;
use nspass_wire::{Envelope, HeartbeatPayload, MessageType, Payload};
use parking_lot::Mutex as SyncMutex;
use http::Request;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::handler::{EgressConfigHandler, FilterConfigHandler, MetricsSource, TaskHandler};
use crate::state::SessionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

const RECEIVE_IDLE_POLL: Duration = Duration::from_secs(1);
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

struct Inner {
    config: TransportConfig,
    state: SessionState,
    writer: AsyncMutex<Option<WsWriter>>,
    reader: AsyncMutex<Option<WsReader>>,
    reconnect_tx: mpsc::Sender<()>,
    reconnect_rx: SyncMutex<Option<mpsc::Receiver<()>>>,
    inbound_tx: mpsc::Sender<Envelope>,
    inbound_rx: SyncMutex<Option<mpsc::Receiver<Envelope>>>,
    task_handler: Arc<dyn TaskHandler>,
    egress_handler: Arc<dyn EgressConfigHandler>,
    filter_handler: Arc<dyn FilterConfigHandler>,
    metrics_source: Arc<dyn MetricsSource>,
    clock: SharedClock,
    cancel: CancellationToken,
    handles: SyncMutex<Vec<JoinHandle<()>>>,
}

/// A cheaply-cloneable handle to the running session. Cloning shares the
/// same connection, queues and cancellation signal — there is exactly one
/// logical duplex channel per session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(
        config: TransportConfig,
        task_handler: Arc<dyn TaskHandler>,
        egress_handler: Arc<dyn EgressConfigHandler>,
        filter_handler: Arc<dyn FilterConfigHandler>,
        metrics_source: Arc<dyn MetricsSource>,
        clock: SharedClock,
    ) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_queue_capacity);

        let inner = Arc::new(Inner {
            config,
            state: SessionState::new(),
            writer: AsyncMutex::new(None),
            reader: AsyncMutex::new(None),
            reconnect_tx,
            reconnect_rx: SyncMutex::new(Some(reconnect_rx)),
            inbound_tx,
            inbound_rx: SyncMutex::new(Some(inbound_rx)),
            task_handler,
            egress_handler,
            filter_handler,
            metrics_source,
            clock,
            cancel: CancellationToken::new(),
            handles: SyncMutex::new(Vec::new()),
        });

        Self { inner }
    }

    /// Whether the underlying connection is currently live.
    pub fn is_connected(&self) -> bool {
        self.inner.state.is_connected()
    }

    /// Begin the five background loops and return immediately.
    /// The reconnect and dispatch loops each take their channel receiver on
    /// first run; calling `start()` a second time on the same session spawns
    /// loops that find no receiver left and exit immediately.
    pub fn start(&self) {
        let _ = self.inner.reconnect_tx.try_send(());

        let handles = vec![
            tokio::spawn(reconnect_loop(self.inner.clone())),
            tokio::spawn(receive_loop(self.inner.clone())),
            tokio::spawn(dispatch_loop(self.inner.clone())),
            tokio::spawn(heartbeat_loop(self.inner.clone())),
            tokio::spawn(metrics_loop(self.inner.clone())),
        ];
        *self.inner.handles.lock() = handles;
    }

    /// Cancel every loop, close the channel, and block until quiescent
    /// All loops are cancelled and joined before this returns.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        let handles = std::mem::take(&mut *self.inner.handles.lock());
        for handle in handles {
            if tokio::time::timeout(STOP_JOIN_TIMEOUT, handle).await.is_err() {
                warn!("a transport loop did not exit within the stop timeout");
            }
        }
        *self.inner.writer.lock().await = None;
        *self.inner.reader.lock().await = None;
        self.inner.state.set_connected(false);
    }

    /// Fire-and-forget send: silently drops if disconnected.
    pub fn send(&self, envelope: Envelope) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.send_envelope(envelope).await;
        });
    }
}

impl nspass_tasks::EnvelopeSink for Session {
    fn send(&self, envelope: Envelope) {
        Session::send(self, envelope)
    }
}

impl Inner {
    async fn send_envelope(&self, envelope: Envelope) {
        if !self.state.is_connected() {
            return;
        }
        let bytes = nspass_wire::encode(&envelope);
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else { return };
        if let Err(e) = writer.send(Message::Binary(bytes.into())).await {
            drop(guard);
            self.handle_transport_failure(format!("write error: {e}")).await;
        }
    }

    async fn handle_transport_failure(&self, reason: String) {
        warn!(reason, "transport error, will reconnect");
        self.state.set_connected(false);
        *self.writer.lock().await = None;
        *self.reader.lock().await = None;
        let _ = self.reconnect_tx.try_send(());
    }

    async fn dial(&self) -> Result<(WsWriter, WsReader), TransportError> {
        let url = self.config.websocket_url()?;
        let uri: http::Uri = url.parse().map_err(|_| TransportError::InvalidBaseUrl(url.clone()))?;
        let host = uri.host().ok_or_else(|| TransportError::InvalidBaseUrl(url.clone()))?.to_string();
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Key", generate_key())
            .header("Server-ID", self.config.agent_id.as_str())
            .header("Agent-Token", self.config.token.as_str())
            .header("User-Agent", "nspass-agent/1.0")
            .body(())
            .map_err(|e| TransportError::Dial(e.to_string()))?;

        match connect_async(request).await {
            Ok((stream, _response)) => {
                let (writer, reader) = stream.split();
                Ok((writer, reader))
            }
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                Err(TransportError::HandshakeRejected { status: response.status().as_u16() })
            }
            Err(e) => Err(TransportError::Dial(e.to_string())),
        }
    }
}

/// Loop 1: single-slot reconnect-request channel, fixed backoff, one dial
/// per request, re-enqueue on failure.
async fn reconnect_loop(inner: Arc<Inner>) {
    let Some(mut rx) = inner.reconnect_rx.lock().take() else { return };
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            received = rx.recv() => {
                if received.is_none() {
                    break;
                }
                if inner.state.is_connected() {
                    continue;
                }
                tokio::select! {
                    _ = inner.cancel.cancelled() => break,
                    _ = tokio::time::sleep(inner.config.reconnect_backoff) => {}
                }
                match inner.dial().await {
                    Ok((writer, reader)) => {
                        *inner.writer.lock().await = Some(writer);
                        *inner.reader.lock().await = Some(reader);
                        inner.state.set_connected(true);
                        info!("connected to control plane");
                    }
                    Err(e) => {
                        warn!(error = %e, "dial failed, re-enqueuing reconnect");
                        let _ = inner.reconnect_tx.try_send(());
                    }
                }
            }
        }
    }
}

/// Loop 2: read one frame under a 60s deadline, deserialise, push onto
/// the bounded inbound queue.
async fn receive_loop(inner: Arc<Inner>) {
    loop {
        if inner.cancel.is_cancelled() {
            break;
        }
        if !inner.state.is_connected() {
            tokio::select! {
                _ = inner.cancel.cancelled() => break,
                _ = tokio::time::sleep(RECEIVE_IDLE_POLL) => {}
            }
            continue;
        }

        let reader = inner.reader.lock().await.take();
        let Some(mut reader) = reader else {
            continue;
        };

        let outcome = tokio::time::timeout(inner.config.read_timeout, reader.next()).await;
        *inner.reader.lock().await = Some(reader);

        match outcome {
            Ok(Some(Ok(Message::Binary(bytes)))) => match nspass_wire::decode(&bytes) {
                Ok(envelope) => {
                    if inner.inbound_tx.try_send(envelope).is_err() {
                        warn!("inbound queue full, dropping frame");
                    }
                }
                Err(e) => error!(error = %e, "failed to decode inbound frame, discarding"),
            },
            Ok(Some(Ok(Message::Text(_)))) => {
                warn!("received a text frame, discarding (binary frames only)");
            }
            Ok(Some(Ok(_))) => {} // ping/pong/close: handled by tungstenite or inconsequential
            Ok(Some(Err(e))) => inner.handle_transport_failure(format!("read error: {e}")).await,
            Ok(None) => inner.handle_transport_failure("connection closed by peer".to_string()).await,
            Err(_) => inner.handle_transport_failure("read deadline exceeded".to_string()).await,
        }
    }
}

/// Loop 3: drain the inbound queue, demultiplex by envelope kind, reply
/// with the matching `ACK`.
async fn dispatch_loop(inner: Arc<Inner>) {
    let Some(mut rx) = inner.inbound_rx.lock().take() else { return };
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            envelope = rx.recv() => {
                match envelope {
                    Some(envelope) => {
                        if let Some(reply) = dispatch_one(&inner, envelope).await {
                            inner.send_envelope(reply).await;
                        }
                    }
                    None => break,
                }
            }
        }
    }
}

/// Routes one inbound envelope to its handler and builds the `ACK` reply,
/// without sending it — kept separate from the send so the routing logic is
/// testable without a live connection.
async fn dispatch_one(inner: &Arc<Inner>, envelope: Envelope) -> Option<Envelope> {
    let now_millis = inner.clock.now_millis();
    let source_id = envelope.id;

    match (envelope.kind, envelope.payload) {
        (MessageType::Task, Payload::Task(task)) => {
            let result = inner.task_handler.handle_task(task, now_millis).await;
            Some(Envelope::reply_to(source_id, MessageType::Ack, now_millis, Payload::TaskResult(result)))
        }
        (MessageType::EgressConfig, Payload::EgressConfig(config)) => {
            let ack = inner.egress_handler.handle_egress_config(config.items).await;
            Some(Envelope::reply_to(source_id, MessageType::Ack, now_millis, Payload::EgressAck(ack)))
        }
        (MessageType::FilterConfig, Payload::FilterConfig(config)) => {
            let ack = inner.filter_handler.handle_filter_config(config.rules, now_millis).await;
            Some(Envelope::reply_to(source_id, MessageType::Ack, now_millis, Payload::FilterAck(ack)))
        }
        (kind, _) => {
            warn!(%kind, "received an envelope kind the agent does not act on, ignoring");
            None
        }
    }
}

/// Loop 4: every 30s while connected, send a `HEARTBEAT`.
async fn heartbeat_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.config.heartbeat_interval);
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !inner.state.is_connected() {
                    continue;
                }
                let now_millis = inner.clock.now_millis();
                let envelope = Envelope::new(
                    MessageType::Heartbeat,
                    now_millis,
                    Payload::Heartbeat(HeartbeatPayload {
                        agent_id: inner.config.agent_id.clone(),
                        timestamp_millis: now_millis,
                        status: "online".to_string(),
                        labels: HashMap::new(),
                    }),
                );
                inner.send_envelope(envelope).await;
            }
        }
    }
}

/// Loop 5: every 60s while connected, sample and send up to five
/// `METRICS` frames.
async fn metrics_loop(inner: Arc<Inner>) {
    let mut ticker = tokio::time::interval(inner.config.metrics_interval);
    loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !inner.state.is_connected() {
                    continue;
                }
                let now_millis = inner.clock.now_millis();
                for payload in inner.metrics_source.sample(now_millis) {
                    let envelope = Envelope::new(MessageType::Metrics, now_millis, Payload::Metrics(payload));
                    inner.send_envelope(envelope).await;
                }
            }
        }
    }
}
