// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single entry point for publishing events.
//!
//! Every event goes to the hub and, when configured, to the webhook
//! publisher. While no dashboard is authenticated, hub-bound events are
//! held in the per-session queue instead. They are replayed, oldest first,
//! as soon as a dashboard authenticates and always before any newer live
//! event reaches the hub.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use wagate_bus::SessionEventQueue;
use wagate_core::{Event, EventSink};
use wagate_webhook::WebhookPublisher;

use crate::hub::EventHub;

/// Fans published events out to the hub, the queue and webhooks.
pub struct EventDispatcher {
    hub: Arc<EventHub>,
    queue: Arc<SessionEventQueue>,
    webhooks: Option<WebhookPublisher>,
    /// Serializes queue-or-broadcast decisions with replays.
    routing: Mutex<()>,
}

impl EventDispatcher {
    pub fn new(hub: Arc<EventHub>, queue: Arc<SessionEventQueue>) -> Self {
        Self {
            hub,
            queue,
            webhooks: None,
            routing: Mutex::new(()),
        }
    }

    pub fn with_webhooks(mut self, publisher: WebhookPublisher) -> Self {
        self.webhooks = Some(publisher);
        self
    }

    /// Broadcast everything queued so far. Returns the number of events replayed.
    pub fn replay_queued(&self) -> usize {
        let _routing = self.routing.lock().unwrap_or_else(|e| e.into_inner());
        self.drain_to_hub()
    }

    fn drain_to_hub(&self) -> usize {
        if self.hub.authenticated_count() == 0 || self.queue.is_empty() {
            return 0;
        }
        let mut replayed = 0;
        for (session_id, events) in self.queue.flush_all() {
            if self.hub.replay(&events) == 0 {
                // the last dashboard left after the check above
                debug!(session_id, count = events.len(), "no dashboard took the backlog, requeueing");
                for event in events {
                    self.queue.enqueue(event);
                }
                continue;
            }
            debug!(session_id, count = events.len(), "replaying queued events");
            replayed += events.len();
        }
        if replayed > 0 {
            info!(replayed, "queued events replayed to dashboards");
        }
        replayed
    }

    /// Replay the queue whenever a dashboard authenticates, until `shutdown`.
    pub fn spawn_replay_on_ready(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = this.hub.client_ready() => {
                        this.replay_queued();
                    }
                }
            }
        })
    }
}

impl EventSink for EventDispatcher {
    fn publish(&self, event: Event) {
        {
            let _routing = self.routing.lock().unwrap_or_else(|e| e.into_inner());
            if self.hub.authenticated_count() > 0 {
                self.drain_to_hub();
                self.hub.broadcast(&event);
            } else {
                debug!(
                    session_id = %event.session_id,
                    event_id = %event.id,
                    "no dashboard connected, queueing event"
                );
                self.queue.enqueue(event.clone());
            }
        }

        if let Some(webhooks) = &self.webhooks {
            drop(webhooks.publish(event));
        }
    }
}
