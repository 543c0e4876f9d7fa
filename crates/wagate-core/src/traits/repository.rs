// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence seams. The gateway reads and writes through these; the
//! backing store is owned elsewhere.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::session::Session;
use crate::webhook::WebhookConfig;

/// Read/write access to session records.
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    async fn get(&self, session_id: &str) -> Result<Option<Session>, GatewayError>;

    /// Insert or replace a session record.
    async fn save(&self, session: &Session) -> Result<(), GatewayError>;

    async fn list(&self) -> Result<Vec<Session>, GatewayError>;
}

/// Read-only access to per-session webhook configuration.
#[async_trait]
pub trait WebhookConfigStore: Send + Sync + 'static {
    async fn get(&self, session_id: &str) -> Result<Option<WebhookConfig>, GatewayError>;
}
