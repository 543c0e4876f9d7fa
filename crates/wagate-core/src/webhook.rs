// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session webhook configuration.

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventType};
use crate::jid::JidKind;

/// Webhook settings for one session. Read-only to the publisher.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub session_id: String,
    #[serde(default)]
    pub enabled: bool,
    pub url: String,
    /// HMAC-SHA256 signing secret. `None` means deliveries are unsigned.
    #[serde(default)]
    pub secret: Option<String>,
    /// Subscribed event types. Empty means all.
    #[serde(default)]
    pub events: Vec<EventType>,
    #[serde(default)]
    pub ignore_groups: bool,
    #[serde(default)]
    pub ignore_broadcasts: bool,
    #[serde(default)]
    pub ignore_channels: bool,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("session_id", &self.session_id)
            .field("enabled", &self.enabled)
            .field("url", &self.url)
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .field("events", &self.events)
            .field("ignore_groups", &self.ignore_groups)
            .field("ignore_broadcasts", &self.ignore_broadcasts)
            .field("ignore_channels", &self.ignore_channels)
            .finish()
    }
}

impl WebhookConfig {
    /// An enabled, unsigned webhook that receives every event type.
    pub fn new(session_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            enabled: true,
            url: url.into(),
            secret: None,
            events: Vec::new(),
            ignore_groups: false,
            ignore_broadcasts: false,
            ignore_channels: false,
        }
    }

    /// Whether `event_type` passes the subscription filter.
    pub fn subscribes_to(&self, event_type: EventType) -> bool {
        self.events.is_empty() || self.events.contains(&event_type)
    }

    /// Whether the event's chat kind is one this config ignores.
    pub fn ignores_chat(&self, event: &Event) -> bool {
        let Some(chat) = event.chat_jid() else {
            return false;
        };
        match JidKind::classify(chat) {
            JidKind::Group => self.ignore_groups,
            JidKind::Broadcast => self.ignore_broadcasts,
            JidKind::Channel => self.ignore_channels,
            JidKind::User | JidKind::Unknown => false,
        }
    }

    /// The configured secret, treating an empty string as absent.
    pub fn signing_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }
}
