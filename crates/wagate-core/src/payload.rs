// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed payloads carried in [`Event::data`](crate::event::Event).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload for `connection.connecting`, `connection.connected`,
/// `connection.disconnected` and `connection.logged_out`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionPayload {
    /// The account JID, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jid: Option<String>,
    /// Human-readable reason for disconnects and logouts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Reconnect attempt number (1-based) when the transition is part of a retry cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
}

/// Payload for `connection.failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionFailedPayload {
    pub error_code: String,
    pub error_message: String,
    /// Attempt number (1-based) that failed.
    pub attempt: u32,
    /// Whether an automatic retry has been scheduled.
    pub will_retry: bool,
    /// Delay before the scheduled retry, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

/// Payload for `session.qr_scanned`, `session.authenticated` and `session.expired`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload for `message.received` and `message.sent`.
///
/// Content has already been mapped upstream; only a short summary travels here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message_id: String,
    pub chat_jid: String,
    pub sender_jid: String,
    #[serde(default)]
    pub from_me: bool,
    /// Short content summary (text preview or media kind).
    #[serde(default)]
    pub summary: String,
    pub sent_at: DateTime<Utc>,
}

/// Payload for `message.delivered`, `message.read` and `message.failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptPayload {
    pub message_ids: Vec<String>,
    pub chat_jid: String,
    pub sender_jid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
