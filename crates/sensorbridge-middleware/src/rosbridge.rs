//! rosbridge-compatible WebSocket endpoint.
//!
//! [`RosbridgeServer`] lets dashboards written against the rosbridge v2 JSON
//! protocol (for example `roslib` connecting to `ws://localhost:9090`)
//! consume the bus channels without a ROS installation:
//!
//! 1. A client sends `{"op":"subscribe","topic":"/temp"}` (or
//!    `"unsubscribe"`) to follow a channel by its topic name.
//! 2. Every bus event on a followed channel is forwarded as
//!    `{"op":"publish","topic":"/temp","msg":{"data":23.5}}`.
//!
//! A `subscribe` that names a `"type"` other than the channel's message
//! type is refused.  Other ops and unknown topics are ignored.  The endpoint only reads from
//! the bus; it never publishes.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use sensorbridge_types::{BridgeError, Channel, Event, EventPayload};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;

/// WebSocket server translating bus events into rosbridge `publish` frames.
#[derive(Clone)]
pub struct RosbridgeServer {
    bus: Arc<EventBus>,
}

impl RosbridgeServer {
    /// Create a new endpoint backed by `bus`.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Bind `addr` and serve clients until the task is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Serialization`] if the TCP listener cannot be
    /// bound.
    pub async fn run(self, addr: SocketAddr) -> Result<(), BridgeError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            BridgeError::Serialization(format!("ws bind error on {addr}: {e}"))
        })?;
        info!(%addr, "rosbridge endpoint listening");
        self.serve(listener).await;
        Ok(())
    }

    /// Accept clients on an already-bound listener.  Never returns.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "ws client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "ws accept error");
                }
            }
        }
    }

    async fn handle_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), BridgeError> {
        let ws_stream = accept_async(stream).await.map_err(|e| {
            BridgeError::Serialization(format!("ws handshake from {peer}: {e}"))
        })?;
        debug!(peer = %peer, "ws client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let mut rx = self.bus.subscribe_all();
        let mut subscriptions = HashSet::new();

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok((channel, event)) if subscriptions.contains(&channel) => {
                            let frame = publish_frame(channel, &event);
                            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(peer = %peer, lagged_by = n, "ws client lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        Some(Ok(Message::Text(text))) => {
                            apply_client_op(text.as_str(), &mut subscriptions);
                        }
                        _ => {}
                    }
                }
            }
        }

        debug!(peer = %peer, "ws client disconnected");
        Ok(())
    }
}

/// Apply one inbound rosbridge message to a client's subscription set.
///
/// Returns the channel whose subscription changed, or `None` when the
/// message was ignored.
pub fn apply_client_op(text: &str, subscriptions: &mut HashSet<Channel>) -> Option<Channel> {
    let json = serde_json::from_str::<Value>(text).ok()?;
    let op = json.get("op").and_then(|o| o.as_str())?;
    let topic = json.get("topic").and_then(|t| t.as_str())?;
    let channel = Channel::from_topic(topic)?;

    match op {
        "subscribe" => {
            if let Some(requested) = json.get("type").and_then(|t| t.as_str())
                && requested != channel.message_type()
            {
                warn!(
                    topic,
                    requested,
                    expected = channel.message_type(),
                    "subscribe refused: message type mismatch"
                );
                return None;
            }
            subscriptions.insert(channel);
            Some(channel)
        }
        "unsubscribe" => subscriptions.remove(&channel).then_some(channel),
        _ => None,
    }
}

/// Render a bus event as a rosbridge `publish` frame for `channel`.
pub fn publish_frame(channel: Channel, event: &Event) -> String {
    let data = match &event.payload {
        EventPayload::Temperature(v) | EventPayload::AmmoniaLevel(v) => json!(v),
        EventPayload::AmmoniaAlert(text) => json!(text),
    };
    json!({
        "op": "publish",
        "topic": channel.topic(),
        "msg": { "data": data },
    })
    .to_string()
}
