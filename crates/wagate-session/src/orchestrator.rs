// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session connection state machine with bounded automatic reconnects.
//!
//! Operations on one session are serialized by a per-session async mutex,
//! which is held across the protocol client's `connect` call. Different
//! sessions never contend. Pending reconnect waits run as spawned tasks that
//! observe a child of the orchestrator's shutdown token, so cancelling a
//! session (disconnect, logout, explicit reconnect) or the whole orchestrator
//! stops them promptly.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wagate_core::payload::{ConnectionFailedPayload, ConnectionPayload, PairingPayload};
use wagate_core::{
    Event, EventSink, EventType, GatewayError, ProtocolClient, Session, SessionRepository,
    SessionStatus,
};
use wagate_resilience::{sleep_or_cancel, RetryPolicy};

/// Default reconnect policy: 5 attempts, 1s base, 60s cap.
pub const DEFAULT_RECONNECT_POLICY: RetryPolicy = RetryPolicy {
    max_attempts: 5,
    base_delay: Duration::from_secs(1),
    max_delay: Duration::from_secs(60),
};

/// Mutable per-session bookkeeping, guarded by the session's mutex.
#[derive(Debug, Default)]
struct SlotState {
    /// Attempts made in the current connect cycle.
    attempt: u32,
    /// Cancels the pending reconnect wait, if one is scheduled.
    retry: Option<CancellationToken>,
}

impl SlotState {
    fn cancel_retry(&mut self) -> bool {
        match self.retry.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

enum AttemptOutcome {
    Connected,
    Failed {
        error: GatewayError,
        retry_in: Option<Duration>,
    },
}

struct Inner {
    client: Option<Arc<dyn ProtocolClient>>,
    repository: Arc<dyn SessionRepository>,
    sink: Arc<dyn EventSink>,
    policy: RetryPolicy,
    slots: DashMap<String, Arc<Mutex<SlotState>>>,
    /// Last status written per session, readable without taking a session lock.
    statuses: DashMap<String, SessionStatus>,
    shutdown: CancellationToken,
}

/// Builder for [`SessionOrchestrator`].
pub struct SessionOrchestratorBuilder {
    client: Option<Arc<dyn ProtocolClient>>,
    repository: Arc<dyn SessionRepository>,
    sink: Arc<dyn EventSink>,
    policy: RetryPolicy,
    shutdown: Option<CancellationToken>,
}

impl SessionOrchestratorBuilder {
    /// Wire in the protocol client. Without one, every reconnect fails with
    /// `CLIENT_UNAVAILABLE`.
    pub fn client(mut self, client: Arc<dyn ProtocolClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Parent token; cancelling it stops the processing loop and all pending reconnects.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn build(self) -> SessionOrchestrator {
        SessionOrchestrator {
            inner: Arc::new(Inner {
                client: self.client,
                repository: self.repository,
                sink: self.sink,
                policy: self.policy,
                slots: DashMap::new(),
                statuses: DashMap::new(),
                shutdown: self.shutdown.unwrap_or_default(),
            }),
        }
    }
}

/// Owns the connection state machine of every session.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    pub fn builder(
        repository: Arc<dyn SessionRepository>,
        sink: Arc<dyn EventSink>,
    ) -> SessionOrchestratorBuilder {
        SessionOrchestratorBuilder {
            client: None,
            repository,
            sink,
            policy: DEFAULT_RECONNECT_POLICY,
            shutdown: None,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.inner.shutdown
    }

    /// Register a session in the `Pending` state, or return the existing record.
    pub async fn create_session(&self, id: &str, name: &str) -> Result<Session, GatewayError> {
        if let Some(existing) = self.inner.repository.get(id).await? {
            self.inner.statuses.insert(existing.id.clone(), existing.status);
            return Ok(existing);
        }
        let session = Session::new(id, name);
        self.save(&session).await?;
        info!(session_id = id, "session registered");
        Ok(session)
    }

    /// Last known status of a session.
    pub fn status(&self, session_id: &str) -> Option<SessionStatus> {
        self.inner.statuses.get(session_id).map(|s| *s)
    }

    /// Connected or connecting.
    pub fn is_session_active(&self, session_id: &str) -> bool {
        self.status(session_id).is_some_and(SessionStatus::is_active)
    }

    /// Stop every pending reconnect wait and the processing loop.
    pub fn shutdown(&self) {
        info!("session orchestrator shutting down");
        self.inner.shutdown.cancel();
    }

    /// Connect (or reconnect) a session.
    ///
    /// Publishes `connection.connecting` before the protocol client's connect
    /// is invoked, then either `connection.connected` or `connection.failed`.
    /// A failure schedules an automatic retry with backoff until the retry
    /// policy is exhausted. Calling this cancels any retry already pending
    /// and starts a fresh attempt cycle.
    pub async fn reconnect(
        &self,
        session_id: &str,
        known_jid: Option<&str>,
    ) -> Result<(), GatewayError> {
        let Some(client) = self.inner.client.clone() else {
            let err = GatewayError::ClientUnavailable;
            warn!(session_id, "reconnect requested but no protocol client is wired in");
            self.publish_failure(session_id, &err, 1, None);
            return Err(err);
        };

        let slot = self.slot(session_id);
        let mut state = slot.lock().await;
        if state.cancel_retry() {
            debug!(session_id, "cancelled pending reconnect in favour of explicit request");
        }
        state.attempt = 0;

        let known_jid = known_jid.map(str::to_string);
        match self
            .attempt(client.as_ref(), session_id, &mut state, known_jid.as_deref())
            .await
        {
            AttemptOutcome::Connected => Ok(()),
            AttemptOutcome::Failed { error, retry_in } => {
                if let Some(delay) = retry_in {
                    self.spawn_retry(session_id, &mut state, client, delay, known_jid);
                }
                Err(error)
            }
        }
    }

    /// Operator-requested disconnect. Keeps the stored JID so the session can
    /// reconnect later without pairing.
    pub async fn disconnect(&self, session_id: &str) -> Result<(), GatewayError> {
        let slot = self.slot(session_id);
        let mut state = slot.lock().await;
        let had_retry = state.cancel_retry();
        state.attempt = 0;

        let mut session = self.load(session_id).await?;
        match session.status {
            SessionStatus::Connected | SessionStatus::Connecting => {
                if let Some(client) = &self.inner.client {
                    if let Err(e) = client.disconnect(session_id).await {
                        warn!(session_id, error = %e, "protocol client disconnect failed");
                    }
                }
                session.transition(SessionStatus::Disconnected)?;
                self.save(&session).await?;
                info!(session_id, "session disconnected");
                self.emit(
                    EventType::ConnectionDisconnected,
                    session_id,
                    &ConnectionPayload {
                        jid: session.jid.clone(),
                        reason: Some("disconnect requested".to_string()),
                        attempt: None,
                    },
                );
                Ok(())
            }
            SessionStatus::Disconnected if had_retry => {
                info!(session_id, "pending reconnect cancelled");
                self.emit(
                    EventType::ConnectionDisconnected,
                    session_id,
                    &ConnectionPayload {
                        jid: session.jid.clone(),
                        reason: Some("pending reconnect cancelled".to_string()),
                        attempt: None,
                    },
                );
                Ok(())
            }
            from => Err(GatewayError::InvalidTransition {
                from,
                to: SessionStatus::Disconnected,
            }),
        }
    }

    /// The remote side revoked the session. Terminal until a new pairing.
    pub async fn handle_logout(
        &self,
        session_id: &str,
        reason: Option<String>,
    ) -> Result<(), GatewayError> {
        let slot = self.slot(session_id);
        let mut state = slot.lock().await;
        state.cancel_retry();
        state.attempt = 0;

        let mut session = self.load(session_id).await?;
        if session.status == SessionStatus::LoggedOut {
            debug!(session_id, "logout for a session already logged out");
            return Ok(());
        }
        session.transition(SessionStatus::LoggedOut)?;
        self.save(&session).await?;
        warn!(session_id, reason = reason.as_deref().unwrap_or(""), "session logged out");
        self.emit(
            EventType::ConnectionLoggedOut,
            session_id,
            &ConnectionPayload {
                jid: session.jid.clone(),
                reason,
                attempt: None,
            },
        );
        Ok(())
    }

    /// The transport dropped while connected: mark the session disconnected
    /// and start an automatic reconnect cycle.
    pub async fn handle_stream_disconnected(
        &self,
        session_id: &str,
        reason: &str,
    ) -> Result<(), GatewayError> {
        let slot = self.slot(session_id);
        let mut state = slot.lock().await;

        let mut session = self.load(session_id).await?;
        if session.status != SessionStatus::Connected {
            debug!(session_id, status = %session.status, "ignoring stream drop for inactive session");
            return Ok(());
        }
        session.transition(SessionStatus::Disconnected)?;
        self.save(&session).await?;
        warn!(session_id, reason, "session stream disconnected");
        self.emit(
            EventType::ConnectionDisconnected,
            session_id,
            &ConnectionPayload {
                jid: session.jid.clone(),
                reason: Some(reason.to_string()),
                attempt: None,
            },
        );

        state.cancel_retry();
        // The drop is the cycle's first failure; retries continue the backoff from there.
        state.attempt = 1;
        match self.inner.client.clone() {
            Some(client) if !self.inner.shutdown.is_cancelled() => {
                let delay = self.inner.policy.delay_after(1);
                self.spawn_retry(session_id, &mut state, client, delay, session.jid.clone());
            }
            _ => {}
        }
        Ok(())
    }

    /// Pairing progress: the QR code was scanned.
    pub fn handle_qr_scanned(&self, session_id: &str) {
        info!(session_id, "pairing QR code scanned");
        self.emit(EventType::SessionQrScanned, session_id, &PairingPayload::default());
    }

    /// Pairing finished; the account JID is known.
    pub fn handle_authenticated(&self, session_id: &str, jid: &str) {
        info!(session_id, jid, "session authenticated");
        self.emit(
            EventType::SessionAuthenticated,
            session_id,
            &PairingPayload {
                jid: Some(jid.to_string()),
                reason: None,
            },
        );
    }

    /// The pairing window closed before the QR code was scanned.
    pub fn handle_qr_expired(&self, session_id: &str) {
        info!(session_id, "pairing QR code expired");
        self.emit(
            EventType::SessionExpired,
            session_id,
            &PairingPayload {
                jid: None,
                reason: Some("qr code expired".to_string()),
            },
        );
    }

    /// Build and publish an event. Construction failures are logged and dropped.
    pub(crate) fn emit<T>(&self, event_type: EventType, session_id: &str, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        match Event::generate(event_type, session_id, payload) {
            Ok(event) => {
                debug!(session_id, event_id = %event.id, %event_type, "publishing event");
                self.inner.sink.publish(event);
            }
            Err(e) => {
                error!(session_id, %event_type, error = %e, "dropping event that failed to build");
            }
        }
    }

    fn slot(&self, session_id: &str) -> Arc<Mutex<SlotState>> {
        self.inner
            .slots
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    async fn load(&self, session_id: &str) -> Result<Session, GatewayError> {
        let session = self
            .inner
            .repository
            .get(session_id)
            .await?
            .ok_or_else(|| GatewayError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        self.inner.statuses.insert(session.id.clone(), session.status);
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<(), GatewayError> {
        self.inner.statuses.insert(session.id.clone(), session.status);
        self.inner.repository.save(session).await
    }

    /// Load the session, move it to `Connecting` and persist it.
    async fn begin_connect(&self, session_id: &str) -> Result<Session, GatewayError> {
        let mut session = self.load(session_id).await?;
        if session.status != SessionStatus::Connecting {
            session.transition(SessionStatus::Connecting)?;
        }
        self.save(&session).await?;
        Ok(session)
    }

    /// One connect attempt. Publishes every outcome; never spawns.
    async fn attempt(
        &self,
        client: &dyn ProtocolClient,
        session_id: &str,
        state: &mut SlotState,
        known_jid: Option<&str>,
    ) -> AttemptOutcome {
        state.attempt += 1;
        let attempt = state.attempt;

        let mut session = match self.begin_connect(session_id).await {
            Ok(session) => session,
            Err(error) => {
                error!(session_id, error = %error, "cannot start connect attempt");
                self.publish_failure(session_id, &error, attempt, None);
                return AttemptOutcome::Failed {
                    error,
                    retry_in: None,
                };
            }
        };

        self.emit(
            EventType::ConnectionConnecting,
            session_id,
            &ConnectionPayload {
                jid: session.jid.clone(),
                reason: None,
                attempt: Some(attempt),
            },
        );
        info!(session_id, attempt, "connecting session");

        match client.connect(session_id).await {
            Ok(()) => {
                self.complete_connect(client, &mut session, known_jid, attempt)
                    .await;
                state.attempt = 0;
                AttemptOutcome::Connected
            }
            Err(error) => self.fail_connect(&mut session, error, attempt).await,
        }
    }

    async fn complete_connect(
        &self,
        client: &dyn ProtocolClient,
        session: &mut Session,
        known_jid: Option<&str>,
        attempt: u32,
    ) {
        let reported = match client.session_jid(&session.id).await {
            Ok(jid) => jid,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "protocol client could not report JID");
                None
            }
        };
        let jid = reported.or_else(|| known_jid.map(str::to_string));

        if let Err(e) = session.mark_connected(jid) {
            error!(session_id = %session.id, error = %e, "unexpected state after connect");
        }
        if let Err(e) = self.save(session).await {
            error!(session_id = %session.id, error = %e, "failed to persist connected session");
        }

        info!(session_id = %session.id, jid = session.jid.as_deref().unwrap_or(""), "session connected");
        self.emit(
            EventType::ConnectionConnected,
            &session.id,
            &ConnectionPayload {
                jid: session.jid.clone(),
                reason: None,
                attempt: Some(attempt),
            },
        );
    }

    async fn fail_connect(
        &self,
        session: &mut Session,
        error: GatewayError,
        attempt: u32,
    ) -> AttemptOutcome {
        if let Err(e) = session.transition(SessionStatus::Disconnected) {
            error!(session_id = %session.id, error = %e, "unexpected state after failed connect");
        }
        if let Err(e) = self.save(session).await {
            error!(session_id = %session.id, error = %e, "failed to persist disconnected session");
        }

        let policy = self.inner.policy;
        let retry_in = (policy.should_retry(attempt) && !self.inner.shutdown.is_cancelled())
            .then(|| policy.delay_after(attempt));

        match retry_in {
            Some(delay) => warn!(
                session_id = %session.id,
                attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "connect failed, retry scheduled"
            ),
            None => error!(
                session_id = %session.id,
                attempt,
                error = %error,
                "connect failed, no further automatic retries"
            ),
        }
        self.publish_failure(&session.id, &error, attempt, retry_in);

        AttemptOutcome::Failed { error, retry_in }
    }

    fn publish_failure(
        &self,
        session_id: &str,
        error: &GatewayError,
        attempt: u32,
        retry_in: Option<Duration>,
    ) {
        let mut message = error.to_string();
        if message.trim().is_empty() {
            message = error.code().to_string();
        }
        self.emit(
            EventType::ConnectionFailed,
            session_id,
            &ConnectionFailedPayload {
                error_code: error.code().to_string(),
                error_message: message,
                attempt,
                will_retry: retry_in.is_some(),
                retry_in_ms: retry_in.map(|d| d.as_millis() as u64),
            },
        );
    }

    fn spawn_retry(
        &self,
        session_id: &str,
        state: &mut SlotState,
        client: Arc<dyn ProtocolClient>,
        delay: Duration,
        known_jid: Option<String>,
    ) {
        let token = self.inner.shutdown.child_token();
        state.retry = Some(token.clone());
        let this = self.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            this.retry_loop(client, session_id, token, delay, known_jid)
                .await;
        });
    }

    /// Sleeps and retries until connected, exhausted, or cancelled.
    async fn retry_loop(
        self,
        client: Arc<dyn ProtocolClient>,
        session_id: String,
        token: CancellationToken,
        mut delay: Duration,
        known_jid: Option<String>,
    ) {
        loop {
            if !sleep_or_cancel(delay, &token).await {
                return;
            }
            let slot = self.slot(&session_id);
            let mut state = slot.lock().await;
            // A disconnect/logout/reconnect may have won the lock first.
            if token.is_cancelled() {
                return;
            }
            match self
                .attempt(client.as_ref(), &session_id, &mut state, known_jid.as_deref())
                .await
            {
                AttemptOutcome::Failed {
                    retry_in: Some(next),
                    ..
                } => delay = next,
                AttemptOutcome::Connected | AttemptOutcome::Failed { retry_in: None, .. } => {
                    state.retry = None;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;
    use wagate_core::memory::InMemorySessionRepository;
    use wagate_test_utils::{MockProtocolClient, RecordingSink};

    use super::*;

    fn orchestrator(client: Arc<MockProtocolClient>, sink: RecordingSink) -> SessionOrchestrator {
        let repository = Arc::new(InMemorySessionRepository::with_sessions([Session::new(
            "s1", "Support",
        )]));
        SessionOrchestrator::builder(repository, Arc::new(sink))
            .client(client)
            .retry_policy(RetryPolicy::new(
                1,
                Duration::from_millis(10),
                Duration::from_millis(10),
            ))
            .build()
    }

    #[test]
    fn default_policy_is_five_attempts_capped_at_a_minute() {
        assert_eq!(DEFAULT_RECONNECT_POLICY.max_attempts, 5);
        assert_eq!(DEFAULT_RECONNECT_POLICY.delay_after(1), Duration::from_secs(1));
        assert_eq!(DEFAULT_RECONNECT_POLICY.delay_after(10), Duration::from_secs(60));
    }

    #[tokio::test]
    #[traced_test]
    async fn exhausted_connect_is_logged_as_error() {
        let client = Arc::new(MockProtocolClient::new());
        client.fail_by_default("handshake rejected");
        let sink = RecordingSink::new();
        let orch = orchestrator(client, sink.clone());

        assert!(orch.reconnect("s1", None).await.is_err());
        assert!(logs_contain("no further automatic retries"));

        let failed = sink.events().pop().unwrap();
        assert_eq!(failed.event_type, EventType::ConnectionFailed);
        assert_eq!(failed.data["will_retry"], false);
    }

    #[tokio::test]
    async fn emit_drops_events_without_session_id() {
        let sink = RecordingSink::new();
        let orch = orchestrator(Arc::new(MockProtocolClient::new()), sink.clone());
        orch.handle_qr_scanned("");
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn empty_receipts_are_ignored() {
        let sink = RecordingSink::new();
        let orch = orchestrator(Arc::new(MockProtocolClient::new()), sink.clone());
        orch.handle_receipt(
            "s1",
            wagate_core::ReceiptKind::Delivered,
            &wagate_core::payload::ReceiptPayload {
                message_ids: vec![],
                chat_jid: "a@s.whatsapp.net".into(),
                sender_jid: "b@s.whatsapp.net".into(),
                reason: None,
            },
        );
        assert!(sink.is_empty());
    }
}
