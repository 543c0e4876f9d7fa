// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket connection handler for dashboard clients.
//!
//! Client -> Server (JSON), once, within the auth timeout:
//! ```json
//! {"type": "auth", "api_key": "k1"}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "auth_response", "success": true, "message": "authenticated"}
//! {"id": "...", "type": "message.received", "session_id": "s1", ...}
//! ```
//!
//! A wrong key or any other first message gets `success: false` and the
//! connection is closed. A client that stays silent past the auth timeout is
//! closed without a response.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::hub::{ClientBacklog, ClientId, EventHub, HubSettings};
use crate::server::AppState;

/// First message a client must send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Auth { api_key: String },
}

/// Reply to the auth message.
#[derive(Debug, Serialize)]
struct AuthResponse<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    success: bool,
    message: &'a str,
}

impl<'a> AuthResponse<'a> {
    fn new(success: bool, message: &'a str) -> Self {
        Self {
            kind: "auth_response",
            success,
            message,
        }
    }

    fn frame(&self) -> serde_json::Result<Message> {
        serde_json::to_string(self).map(|json| Message::Text(json.into()))
    }
}

enum AuthRead {
    Key(String),
    Invalid(&'static str),
    Closed,
}

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Drive one dashboard connection: auth, then broadcast frames and pings.
pub async fn handle_socket(socket: WebSocket, hub: Arc<EventHub>) {
    let client = hub.register();
    let id = client.id;
    let settings = hub.settings().clone();
    let (mut sink, mut stream) = socket.split();

    let read = tokio::select! {
        _ = client.cancel.cancelled() => AuthRead::Closed,
        read = tokio::time::timeout(settings.auth_timeout, read_auth(&mut stream)) => match read {
            Ok(read) => read,
            Err(_) => {
                info!(client_id = id, "hub client did not authenticate in time");
                let _ = sink.close().await;
                hub.deregister(id);
                return;
            }
        },
    };

    match read {
        AuthRead::Key(key) => {
            if !hub.authenticate(id, &key) {
                reject(&mut sink, &settings, "invalid api key").await;
                hub.deregister(id);
                return;
            }
        }
        AuthRead::Invalid(reason) => {
            warn!(client_id = id, reason, "hub client sent an invalid auth message");
            reject(&mut sink, &settings, reason).await;
            hub.deregister(id);
            return;
        }
        AuthRead::Closed => {
            hub.deregister(id);
            return;
        }
    }

    // Frames broadcast or replayed since authenticate() are still waiting, so the ack goes first.
    let ack = match AuthResponse::new(true, "authenticated").frame() {
        Ok(ack) => ack,
        Err(e) => {
            warn!(client_id = id, error = %e, "failed to encode auth acknowledgement");
            hub.deregister(id);
            return;
        }
    };
    let sent = tokio::time::timeout(settings.write_timeout, sink.send(ack)).await;
    if !matches!(sent, Ok(Ok(()))) {
        debug!(client_id = id, "failed to acknowledge hub client auth");
        hub.deregister(id);
        return;
    }

    let last_pong = Arc::new(Mutex::new(Instant::now()));
    let writer = tokio::spawn(write_loop(
        sink,
        client.frames,
        client.backlog.clone(),
        client.cancel.clone(),
        hub.clone(),
        id,
        last_pong.clone(),
    ));

    read_loop(&mut stream, &client.cancel, &last_pong, id).await;

    client.cancel.cancel();
    hub.deregister(id);
    let _ = writer.await;
    debug!(client_id = id, "hub connection closed");
}

async fn read_auth(stream: &mut WsStream) -> AuthRead {
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Binary(_)) => return AuthRead::Invalid("expected a text auth message"),
            Ok(Message::Close(_)) | Err(_) => return AuthRead::Closed,
        };
        return match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(ClientMessage::Auth { api_key }) => AuthRead::Key(api_key),
            Err(_) => AuthRead::Invalid("expected an auth message"),
        };
    }
    AuthRead::Closed
}

async fn reject(sink: &mut WsSink, settings: &HubSettings, message: &str) {
    match AuthResponse::new(false, message).frame() {
        Ok(frame) => {
            let _ = tokio::time::timeout(settings.write_timeout, sink.send(frame)).await;
        }
        Err(e) => warn!(error = %e, "failed to encode auth rejection"),
    }
    let _ = tokio::time::timeout(settings.write_timeout, sink.close()).await;
}

async fn read_loop(
    stream: &mut WsStream,
    cancel: &CancellationToken,
    last_pong: &Mutex<Instant>,
    id: ClientId,
) {
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return,
            msg = stream.next() => msg,
        };
        match msg {
            Some(Ok(Message::Pong(_))) => {
                *last_pong.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
            }
            Some(Ok(Message::Close(_))) | None => return,
            Some(Err(e)) => {
                debug!(client_id = id, error = %e, "hub client read failed");
                return;
            }
            // Dashboards are receive-only after auth.
            Some(Ok(_)) => {}
        }
    }
}

/// Replayed backlog first, then live frames, with pings interleaved.
async fn write_loop(
    mut sink: WsSink,
    mut frames: mpsc::Receiver<Utf8Bytes>,
    backlog: Arc<ClientBacklog>,
    cancel: CancellationToken,
    hub: Arc<EventHub>,
    id: ClientId,
    last_pong: Arc<Mutex<Instant>>,
) {
    let settings = hub.settings().clone();
    let pong_deadline = settings.ping_interval + settings.write_timeout;
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );

    loop {
        let outgoing = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ping.tick() => {
                let silent_for = last_pong.lock().unwrap_or_else(|e| e.into_inner()).elapsed();
                if silent_for > pong_deadline {
                    warn!(client_id = id, ?silent_for, "hub client stopped answering pings");
                    break;
                }
                Message::Ping(Default::default())
            }
            frame = backlog.next() => Message::Text(frame),
            frame = frames.recv(), if backlog.is_empty() => match frame {
                Some(frame) => Message::Text(frame),
                None => break,
            },
        };
        match tokio::time::timeout(settings.write_timeout, sink.send(outgoing)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(client_id = id, error = %e, "hub client write failed");
                break;
            }
            Err(_) => {
                warn!(client_id = id, "hub client write timed out");
                break;
            }
        }
    }

    let _ = tokio::time::timeout(settings.write_timeout, sink.close()).await;
    cancel.cancel();
    hub.deregister(id);
}
