// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of WebSocket dashboard clients and the broadcaster.
//!
//! Each client owns a bounded outbound buffer drained by its own writer
//! task. Broadcasting never waits on a client: a full buffer disconnects
//! that client. Broadcasts are serialized by one lock so every client sees
//! events in the hub's global publish order.
//!
//! Replayed backlogs bypass the bounded buffer. They land in the client's
//! [`ClientBacklog`], which its writer drains with awaited sends before it
//! takes any live frame.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wagate_core::Event;

/// Identifier of one registered connection.
pub type ClientId = u64;

/// Hub protocol settings.
#[derive(Clone)]
pub struct HubSettings {
    /// Key clients must present. `None` or empty accepts any key.
    pub shared_key: Option<String>,
    /// Window for the client's auth message.
    pub auth_timeout: Duration,
    pub ping_interval: Duration,
    /// Bound on any single write, and the grace period for a pong.
    pub write_timeout: Duration,
    /// Outbound frames buffered per client before it is dropped as too slow.
    pub client_buffer: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            shared_key: None,
            auth_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            client_buffer: 256,
        }
    }
}

impl std::fmt::Debug for HubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubSettings")
            .field("shared_key", &self.shared_key.as_ref().map(|_| "[redacted]"))
            .field("auth_timeout", &self.auth_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("write_timeout", &self.write_timeout)
            .field("client_buffer", &self.client_buffer)
            .finish()
    }
}

/// Replayed frames waiting for one client's writer. Unbounded; its size is
/// limited by the event queue it was flushed from.
#[derive(Debug, Default)]
pub struct ClientBacklog {
    frames: Mutex<VecDeque<Utf8Bytes>>,
    ready: Notify,
}

impl ClientBacklog {
    fn extend(&self, frames: &[Utf8Bytes]) {
        self.lock().extend(frames.iter().cloned());
        self.ready.notify_one();
    }

    pub fn pop(&self) -> Option<Utf8Bytes> {
        self.lock().pop_front()
    }

    /// Wait for the next replayed frame.
    pub async fn next(&self) -> Utf8Bytes {
        loop {
            if let Some(frame) = self.pop() {
                return frame;
            }
            self.ready.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Utf8Bytes>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct ClientEntry {
    tx: mpsc::Sender<Utf8Bytes>,
    backlog: Arc<ClientBacklog>,
    authenticated: AtomicBool,
    cancel: CancellationToken,
}

/// A freshly registered connection, handed to its connection task.
pub struct HubClient {
    pub id: ClientId,
    /// Broadcast frames for this client, in publish order.
    pub frames: mpsc::Receiver<Utf8Bytes>,
    /// Replayed frames; always older than anything in `frames`.
    pub backlog: Arc<ClientBacklog>,
    /// Fires when the hub drops the client or shuts down.
    pub cancel: CancellationToken,
}

/// Broadcast hub for dashboard clients.
pub struct EventHub {
    settings: HubSettings,
    clients: DashMap<ClientId, Arc<ClientEntry>>,
    next_id: AtomicU64,
    authenticated: AtomicUsize,
    broadcast_lock: Mutex<()>,
    ready: Notify,
    shutdown: CancellationToken,
}

impl EventHub {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            settings,
            clients: DashMap::new(),
            next_id: AtomicU64::new(1),
            authenticated: AtomicUsize::new(0),
            broadcast_lock: Mutex::new(()),
            ready: Notify::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    /// Register a new, unauthenticated connection.
    pub fn register(&self) -> HubClient {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, frames) = mpsc::channel(self.settings.client_buffer.max(1));
        let cancel = self.shutdown.child_token();
        let backlog = Arc::new(ClientBacklog::default());
        self.clients.insert(
            id,
            Arc::new(ClientEntry {
                tx,
                backlog: backlog.clone(),
                authenticated: AtomicBool::new(false),
                cancel: cancel.clone(),
            }),
        );
        debug!(client_id = id, "hub client registered");
        HubClient {
            id,
            frames,
            backlog,
            cancel,
        }
    }

    /// Check `key` and mark the client authenticated on success.
    pub fn authenticate(&self, id: ClientId, key: &str) -> bool {
        if !self.key_matches(key) {
            warn!(client_id = id, "hub client presented an invalid key");
            return false;
        }
        // The map guard keeps a concurrent deregister from racing the counter.
        let newly = {
            let Some(entry) = self.clients.get(&id) else {
                return false;
            };
            let newly = !entry.authenticated.swap(true, Ordering::AcqRel);
            if newly {
                self.authenticated.fetch_add(1, Ordering::AcqRel);
            }
            newly
        };
        if newly {
            info!(client_id = id, "hub client authenticated");
            self.ready.notify_one();
        }
        true
    }

    fn key_matches(&self, key: &str) -> bool {
        match self.settings.shared_key.as_deref() {
            None | Some("") => true,
            Some(expected) => expected == key,
        }
    }

    /// Remove a connection. Idempotent.
    pub fn deregister(&self, id: ClientId) {
        if let Some((_, entry)) = self.clients.remove(&id) {
            entry.cancel.cancel();
            if entry.authenticated.load(Ordering::Acquire) {
                self.authenticated.fetch_sub(1, Ordering::AcqRel);
            }
            debug!(client_id = id, "hub client removed");
        }
    }

    /// Send `event` to every authenticated client. Returns how many accepted it.
    pub fn broadcast(&self, event: &Event) -> usize {
        let frame = match serde_json::to_string(event) {
            Ok(json) => Utf8Bytes::from(json),
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "dropping event that cannot be serialized");
                return 0;
            }
        };

        let _order = self
            .broadcast_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for client in self.clients.iter() {
            if !client.authenticated.load(Ordering::Acquire) {
                continue;
            }
            match client.tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(client_id = *client.key(), "hub client too slow, disconnecting");
                    dropped.push(*client.key());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dropped.push(*client.key()),
            }
        }
        for id in dropped {
            self.deregister(id);
        }
        debug!(event_id = %event.id, event_type = %event.event_type, delivered, "event broadcast");
        delivered
    }

    /// Hand queued `events` to every authenticated client's backlog, in
    /// order. Never drops a client. Returns how many clients took them.
    pub fn replay(&self, events: &[Event]) -> usize {
        let frames: Vec<Utf8Bytes> = events
            .iter()
            .filter_map(|event| match serde_json::to_string(event) {
                Ok(json) => Some(Utf8Bytes::from(json)),
                Err(e) => {
                    warn!(event_id = %event.id, error = %e, "dropping event that cannot be serialized");
                    None
                }
            })
            .collect();

        let _order = self
            .broadcast_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let mut clients = 0;
        for client in self.clients.iter() {
            if client.authenticated.load(Ordering::Acquire) {
                client.backlog.extend(&frames);
                clients += 1;
            }
        }
        debug!(events = frames.len(), clients, "backlog replayed");
        clients
    }

    /// Registered connections, authenticated or not.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn authenticated_count(&self) -> usize {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn is_client_authenticated(&self, id: ClientId) -> bool {
        self.clients
            .get(&id)
            .is_some_and(|c| c.authenticated.load(Ordering::Acquire))
    }

    /// Resolves after a client authenticates. Authentications that happen
    /// while nobody waits are remembered as a single pending wake-up.
    pub async fn client_ready(&self) {
        self.ready.notified().await;
    }

    /// Disconnect every client and refuse new ones.
    pub fn shutdown(&self) {
        info!(clients = self.client_count(), "hub shutting down");
        self.shutdown.cancel();
        let ids: Vec<ClientId> = self.clients.iter().map(|c| *c.key()).collect();
        for id in ids {
            self.deregister(id);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
