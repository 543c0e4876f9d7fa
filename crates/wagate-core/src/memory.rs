// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory repositories, used by the binary when no external store is
//! wired in and by tests.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::GatewayError;
use crate::session::Session;
use crate::traits::{SessionRepository, WebhookConfigStore};
use crate::webhook::WebhookConfig;

/// Session repository backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository with existing sessions.
    pub fn with_sessions(sessions: impl IntoIterator<Item = Session>) -> Self {
        let repo = Self::new();
        for session in sessions {
            repo.sessions.insert(session.id.clone(), session);
        }
        repo
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, GatewayError> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn save(&self, session: &Session) -> Result<(), GatewayError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Session>, GatewayError> {
        let mut sessions: Vec<Session> = self.sessions.iter().map(|e| e.value().clone()).collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(sessions)
    }
}

/// Webhook config store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryWebhookStore {
    configs: DashMap<String, WebhookConfig>,
}

impl InMemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the config for its session.
    pub fn upsert(&self, config: WebhookConfig) {
        self.configs.insert(config.session_id.clone(), config);
    }

    pub fn remove(&self, session_id: &str) -> Option<WebhookConfig> {
        self.configs.remove(session_id).map(|(_, c)| c)
    }
}

impl FromIterator<WebhookConfig> for InMemoryWebhookStore {
    fn from_iter<I: IntoIterator<Item = WebhookConfig>>(iter: I) -> Self {
        let store = Self::new();
        for config in iter {
            store.upsert(config);
        }
        store
    }
}

#[async_trait]
impl WebhookConfigStore for InMemoryWebhookStore {
    async fn get(&self, session_id: &str) -> Result<Option<WebhookConfig>, GatewayError> {
        Ok(self.configs.get(session_id).map(|c| c.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    #[tokio::test]
    async fn session_repository_round_trip() {
        let repo = InMemorySessionRepository::new();
        assert!(repo.get("s1").await.unwrap().is_none());

        let mut session = Session::new("s1", "Sales");
        repo.save(&session).await.unwrap();
        session.transition(SessionStatus::Connecting).unwrap();
        repo.save(&session).await.unwrap();

        let loaded = repo.get("s1").await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Connecting);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn webhook_store_upsert_and_remove() {
        let store: InMemoryWebhookStore =
            [WebhookConfig::new("s1", "http://a/hook")].into_iter().collect();
        assert!(store.get("s1").await.unwrap().is_some());
        assert!(store.get("s2").await.unwrap().is_none());

        store.upsert(WebhookConfig::new("s1", "http://b/hook"));
        assert_eq!(store.get("s1").await.unwrap().unwrap().url, "http://b/hook");

        assert!(store.remove("s1").is_some());
        assert!(store.get("s1").await.unwrap().is_none());
    }
}
