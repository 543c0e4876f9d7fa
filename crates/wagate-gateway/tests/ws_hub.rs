// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard WebSocket protocol against a real bound server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use wagate_bus::SessionEventQueue;
use wagate_core::{Event, EventSink, EventType};
use wagate_gateway::{bind, serve, AppState, EventDispatcher, EventHub, HubSettings};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Server {
    addr: SocketAddr,
    hub: Arc<EventHub>,
    shutdown: CancellationToken,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start(settings: HubSettings) -> Server {
    let hub = Arc::new(EventHub::new(settings));
    let listener = bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let state = AppState::new(hub.clone(), Arc::new(SessionEventQueue::new(16)));
    tokio::spawn(serve(listener, state, shutdown.clone()));
    Server {
        addr,
        hub,
        shutdown,
    }
}

fn keyed(key: &str) -> HubSettings {
    HubSettings {
        shared_key: Some(key.to_string()),
        ..HubSettings::default()
    }
}

async fn connect(server: &Server) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/ws", server.addr)).await.unwrap();
    ws
}

async fn send_auth(client: &mut Client, key: &str) {
    let auth = serde_json::json!({"type": "auth", "api_key": key}).to_string();
    client.send(Message::text(auth)).await.unwrap();
}

/// Next text frame as JSON, skipping pings.
async fn next_json(client: &mut Client) -> Option<serde_json::Value> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .ok()??;
        match msg.ok()? {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Ping(_) | Message::Pong(_) => continue,
            _ => return None,
        }
    }
}

async fn authed(server: &Server, key: &str) -> Client {
    let mut client = connect(server).await;
    send_auth(&mut client, key).await;
    let ack = next_json(&mut client).await.unwrap();
    assert_eq!(ack["type"], "auth_response");
    assert_eq!(ack["success"], true);
    client
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

fn event(kind: EventType, session_id: &str) -> Event {
    Event::generate(kind, session_id, &serde_json::json!({"attempt": 1})).unwrap()
}

#[tokio::test]
async fn matching_key_is_acknowledged_and_receives_broadcasts() {
    let server = start(keyed("k1")).await;
    let mut client = authed(&server, "k1").await;

    let published = event(EventType::ConnectionConnected, "s1");
    assert_eq!(server.hub.broadcast(&published), 1);

    let received = next_json(&mut client).await.unwrap();
    assert_eq!(received["id"], published.id.as_str());
    assert_eq!(received["type"], "connection.connected");
    assert_eq!(received["session_id"], "s1");
}

#[tokio::test]
async fn wrong_key_is_rejected_and_disconnected() {
    let server = start(keyed("k1")).await;
    let mut client = connect(&server).await;
    send_auth(&mut client, "wrong").await;

    let ack = next_json(&mut client).await.unwrap();
    assert_eq!(ack["type"], "auth_response");
    assert_eq!(ack["success"], false);
    assert!(next_json(&mut client).await.is_none());
    wait_until(|| server.hub.client_count() == 0).await;
}

#[tokio::test]
async fn non_auth_first_message_is_rejected() {
    let server = start(keyed("k1")).await;
    let mut client = connect(&server).await;
    client
        .send(Message::text(r#"{"type":"subscribe","session_id":"s1"}"#))
        .await
        .unwrap();

    let ack = next_json(&mut client).await.unwrap();
    assert_eq!(ack["success"], false);
    assert!(next_json(&mut client).await.is_none());
}

#[tokio::test]
async fn silent_client_is_closed_without_response() {
    let server = start(HubSettings {
        auth_timeout: Duration::from_millis(100),
        ..keyed("k1")
    })
    .await;
    let mut client = connect(&server).await;

    assert!(next_json(&mut client).await.is_none());
    wait_until(|| server.hub.client_count() == 0).await;
}

#[tokio::test]
async fn empty_shared_key_accepts_any_key() {
    let server = start(HubSettings::default()).await;
    let _client = authed(&server, "whatever").await;
    assert_eq!(server.hub.authenticated_count(), 1);
}

#[tokio::test]
async fn every_authenticated_client_gets_every_event_in_order() {
    let server = start(keyed("k1")).await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(authed(&server, "k1").await);
    }

    let events: Vec<Event> = [
        EventType::ConnectionConnecting,
        EventType::ConnectionConnected,
        EventType::MessageReceived,
        EventType::MessageRead,
    ]
    .into_iter()
    .map(|kind| event(kind, "s1"))
    .collect();
    for e in &events {
        assert_eq!(server.hub.broadcast(e), 3);
    }

    for client in &mut clients {
        for e in &events {
            let got = next_json(client).await.unwrap();
            assert_eq!(got["id"], e.id.as_str());
            assert_eq!(got["type"], e.event_type.to_string());
        }
    }
}

#[tokio::test]
async fn unauthenticated_client_sees_no_broadcasts() {
    let server = start(keyed("k1")).await;
    let mut member = authed(&server, "k1").await;
    let mut lurker = connect(&server).await;
    wait_until(|| server.hub.client_count() == 2).await;

    let published = event(EventType::MessageReceived, "s1");
    assert_eq!(server.hub.broadcast(&published), 1);
    assert_eq!(next_json(&mut member).await.unwrap()["id"], published.id.as_str());

    let nothing = tokio::time::timeout(Duration::from_millis(300), lurker.next()).await;
    assert!(nothing.is_err(), "lurker received {nothing:?}");
}

#[tokio::test]
async fn client_count_tracks_connections() {
    let server = start(keyed("k1")).await;
    let first = authed(&server, "k1").await;
    let _second = connect(&server).await;
    wait_until(|| server.hub.client_count() == 2).await;
    assert_eq!(server.hub.authenticated_count(), 1);

    drop(first);
    wait_until(|| server.hub.client_count() == 1).await;
    assert_eq!(server.hub.authenticated_count(), 0);
}

#[tokio::test]
async fn hub_answers_pings_and_sends_its_own() {
    let server = start(HubSettings {
        ping_interval: Duration::from_millis(100),
        ..keyed("k1")
    })
    .await;
    let mut client = authed(&server, "k1").await;

    let ping = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(Ok(Message::Ping(_))) = client.next().await {
                return;
            }
        }
    })
    .await;
    assert!(ping.is_ok(), "no ping from hub");
    // tungstenite answers pings itself; the connection stays up
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(server.hub.authenticated_count(), 1);
}

#[tokio::test]
async fn silent_client_is_dropped_after_pong_deadline() {
    let server = start(HubSettings {
        ping_interval: Duration::from_millis(100),
        write_timeout: Duration::from_millis(100),
        ..keyed("k1")
    })
    .await;
    // Never polled again, so the hub's pings go unanswered.
    let _silent = authed(&server, "k1").await;
    assert_eq!(server.hub.client_count(), 1);

    wait_until(|| server.hub.client_count() == 0).await;
    assert_eq!(server.hub.authenticated_count(), 0);
}

#[tokio::test]
async fn replay_beyond_client_buffer_reaches_socket_in_order() {
    let server = start(keyed("k1")).await;
    let buffer = server.hub.settings().client_buffer;
    let dispatcher = EventDispatcher::new(server.hub.clone(), Arc::new(SessionEventQueue::new(1000)));

    let queued: Vec<Event> = (0..buffer + 44)
        .map(|_| event(EventType::MessageReceived, "s1"))
        .collect();
    for e in &queued {
        dispatcher.publish(e.clone());
    }

    let mut client = authed(&server, "k1").await;
    assert_eq!(dispatcher.replay_queued(), queued.len());
    let live = event(EventType::ConnectionConnected, "s1");
    dispatcher.publish(live.clone());

    for expected in queued.iter().chain(std::iter::once(&live)) {
        let received = next_json(&mut client).await.unwrap();
        assert_eq!(received["id"], expected.id.as_str());
    }
    assert_eq!(server.hub.client_count(), 1);
}

#[tokio::test]
async fn shutdown_closes_connections() {
    let server = start(keyed("k1")).await;
    let mut client = authed(&server, "k1").await;
    server.hub.shutdown();
    assert!(next_json(&mut client).await.is_none());
    assert_eq!(server.hub.client_count(), 0);
}
