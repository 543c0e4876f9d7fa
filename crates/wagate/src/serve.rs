// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `wagate serve`: wires the orchestrator, queue, hub and webhooks together
//! and runs the HTTP server until a shutdown signal arrives.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wagate_bus::SessionEventQueue;
use wagate_config::{HubConfig, WagateConfig, WebhookEntry};
use wagate_core::{GatewayError, ProtocolClient, ProtocolEvent};
use wagate_core::memory::{InMemorySessionRepository, InMemoryWebhookStore};
use wagate_gateway::{AppState, EventDispatcher, EventHub, HubSettings};
use wagate_session::SessionOrchestrator;
use wagate_webhook::WebhookPublisher;

use crate::shutdown;

/// Protocol occurrences buffered between the client and the orchestrator.
const PROTOCOL_EVENT_BUFFER: usize = 1024;

/// Every long-lived component of a running gateway.
pub struct Gateway {
    pub hub: Arc<EventHub>,
    pub queue: Arc<SessionEventQueue>,
    pub orchestrator: SessionOrchestrator,
    /// Where the protocol client reports QR scans, logouts, messages and receipts.
    pub protocol_events: mpsc::Sender<ProtocolEvent>,
    has_client: bool,
    replay: JoinHandle<()>,
    events_loop: JoinHandle<()>,
}

impl Gateway {
    /// Build the components, start the protocol event loop and register the
    /// configured sessions.
    ///
    /// Without a protocol client, reconnect requests fail with
    /// `CLIENT_UNAVAILABLE`.
    pub async fn assemble(
        config: &WagateConfig,
        shutdown: &CancellationToken,
        client: Option<Arc<dyn ProtocolClient>>,
    ) -> Result<Self, GatewayError> {
        let hub = Arc::new(EventHub::new(hub_settings(&config.hub)));
        let queue = Arc::new(SessionEventQueue::new(config.queue.capacity));

        let store: InMemoryWebhookStore = config
            .webhooks
            .iter()
            .map(WebhookEntry::to_webhook_config)
            .collect();
        let publisher = WebhookPublisher::with_settings(
            Arc::new(store),
            config.webhook.retry_policy(),
            config.webhook.request_timeout(),
        )?
        .with_shutdown_token(shutdown.child_token());

        let dispatcher =
            Arc::new(EventDispatcher::new(hub.clone(), queue.clone()).with_webhooks(publisher));
        let replay = dispatcher.spawn_replay_on_ready(shutdown.child_token());

        let has_client = client.is_some();
        let mut builder = SessionOrchestrator::builder(
            Arc::new(InMemorySessionRepository::new()),
            dispatcher,
        )
        .retry_policy(config.reconnect.retry_policy())
        .shutdown_token(shutdown.child_token());
        if let Some(client) = client {
            builder = builder.client(client);
        }
        let orchestrator = builder.build();

        let (protocol_events, rx) = mpsc::channel(PROTOCOL_EVENT_BUFFER);
        let events_loop = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run(rx).await })
        };

        for seed in &config.sessions {
            let session = seed.to_session();
            orchestrator.create_session(&session.id, &session.name).await?;
        }

        Ok(Self {
            hub,
            queue,
            orchestrator,
            protocol_events,
            has_client,
            replay,
            events_loop,
        })
    }

    /// Stop background work and wait for it to finish.
    pub async fn stop(self) {
        self.orchestrator.shutdown();
        drop(self.protocol_events);
        let _ = self.events_loop.await;
        let _ = self.replay.await;
    }
}

pub fn hub_settings(config: &HubConfig) -> HubSettings {
    HubSettings {
        shared_key: config.shared_key.clone(),
        auth_timeout: config.auth_timeout(),
        ping_interval: config.ping_interval(),
        write_timeout: config.write_timeout(),
        client_buffer: config.client_buffer,
    }
}

pub async fn run_serve(config: WagateConfig) -> Result<(), GatewayError> {
    let shutdown = shutdown::install_signal_handler();
    let gateway = Gateway::assemble(&config, &shutdown, None).await?;

    if config.hub.shared_key.as_deref().unwrap_or_default().is_empty() {
        warn!("hub.shared_key is not set, any dashboard key will be accepted");
    }
    if !gateway.has_client {
        warn!("no protocol client configured, sessions cannot connect");
    }
    info!(
        sessions = config.sessions.len(),
        webhooks = config.webhooks.len(),
        queue_capacity = config.queue.capacity,
        "gateway assembled"
    );

    let listener = wagate_gateway::bind(&config.server.host, config.server.port).await?;
    let state = AppState::new(gateway.hub.clone(), gateway.queue.clone());
    let served = wagate_gateway::serve(listener, state, shutdown.clone()).await;

    shutdown.cancel();
    let queue = gateway.queue.clone();
    gateway.stop().await;
    let pending = queue.total();
    if pending > 0 {
        warn!(pending, "discarding queued events that no dashboard received");
    }
    info!("wagate stopped");
    served
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wagate_config::load_and_validate_str;
    use wagate_core::SessionStatus;
    use wagate_test_utils::MockProtocolClient;

    use super::*;

    #[test]
    fn hub_settings_follow_config() {
        let config = load_and_validate_str(
            "[hub]\nshared_key = \"k\"\nauth_timeout_secs = 3\nclient_buffer = 8\n",
        )
        .unwrap();
        let settings = hub_settings(&config.hub);
        assert_eq!(settings.shared_key.as_deref(), Some("k"));
        assert_eq!(settings.auth_timeout, Duration::from_secs(3));
        assert_eq!(settings.ping_interval, Duration::from_secs(30));
        assert_eq!(settings.client_buffer, 8);
    }

    #[tokio::test]
    async fn assembled_gateway_seeds_sessions_and_queues_failures() {
        let config = load_and_validate_str(
            "[[sessions]]\nid = \"s1\"\n\n[[sessions]]\nid = \"s2\"\nname = \"Sales\"\n",
        )
        .unwrap();
        let shutdown = CancellationToken::new();
        let gateway = Gateway::assemble(&config, &shutdown, None).await.unwrap();

        assert_eq!(gateway.orchestrator.status("s1"), Some(SessionStatus::Pending));
        assert_eq!(gateway.orchestrator.status("s2"), Some(SessionStatus::Pending));

        let err = gateway.orchestrator.reconnect("s1", None).await.unwrap_err();
        assert_eq!(err.code(), "CLIENT_UNAVAILABLE");

        // no dashboard is connected, so the failure waits in the queue
        assert_eq!(gateway.queue.size("s1"), 1);
        assert_eq!(gateway.queue.size("s2"), 0);

        shutdown.cancel();
        gateway.stop().await;
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

    #[tokio::test]
    async fn protocol_events_reach_the_orchestrator() {
        let config = load_and_validate_str("[[sessions]]\nid = \"s1\"\n").unwrap();
        let shutdown = CancellationToken::new();
        let gateway = Gateway::assemble(&config, &shutdown, None).await.unwrap();

        gateway
            .protocol_events
            .send(ProtocolEvent::QrScanned {
                session_id: "s1".into(),
            })
            .await
            .unwrap();
        let queue = gateway.queue.clone();
        wait_until(|| queue.size("s1") == 1).await;

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), gateway.stop())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wired_client_lets_sessions_connect() {
        let config = load_and_validate_str("[[sessions]]\nid = \"s1\"\n").unwrap();
        let shutdown = CancellationToken::new();
        let client = Arc::new(MockProtocolClient::new());
        let gateway = Gateway::assemble(&config, &shutdown, Some(client.clone()))
            .await
            .unwrap();
        assert!(gateway.has_client);

        gateway.orchestrator.reconnect("s1", None).await.unwrap();
        assert_eq!(gateway.orchestrator.status("s1"), Some(SessionStatus::Connected));
        assert!(client.is_connected("s1"));

        shutdown.cancel();
        gateway.stop().await;
    }
}
