// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The normalized event model.
//!
//! Every occurrence the gateway reports (connection transitions, pairing
//! progress, message traffic) is turned into an [`Event`] before it reaches
//! the hub, the webhook publisher, or the per-session queue.
//!
//! Wire format:
//! ```json
//! {
//!   "id": "0b6c...",
//!   "type": "connection.failed",
//!   "session_id": "s1",
//!   "timestamp": "2026-01-01T00:00:00Z",
//!   "data": {"error_code": "CONNECT_FAILED", "error_message": "..."}
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::GatewayError;

/// The closed event taxonomy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum EventType {
    #[strum(serialize = "connection.connecting")]
    #[serde(rename = "connection.connecting")]
    ConnectionConnecting,
    #[strum(serialize = "connection.connected")]
    #[serde(rename = "connection.connected")]
    ConnectionConnected,
    #[strum(serialize = "connection.disconnected")]
    #[serde(rename = "connection.disconnected")]
    ConnectionDisconnected,
    #[strum(serialize = "connection.failed")]
    #[serde(rename = "connection.failed")]
    ConnectionFailed,
    #[strum(serialize = "connection.logged_out")]
    #[serde(rename = "connection.logged_out")]
    ConnectionLoggedOut,
    #[strum(serialize = "session.qr_scanned")]
    #[serde(rename = "session.qr_scanned")]
    SessionQrScanned,
    #[strum(serialize = "session.authenticated")]
    #[serde(rename = "session.authenticated")]
    SessionAuthenticated,
    #[strum(serialize = "session.expired")]
    #[serde(rename = "session.expired")]
    SessionExpired,
    #[strum(serialize = "message.received")]
    #[serde(rename = "message.received")]
    MessageReceived,
    #[strum(serialize = "message.sent")]
    #[serde(rename = "message.sent")]
    MessageSent,
    #[strum(serialize = "message.delivered")]
    #[serde(rename = "message.delivered")]
    MessageDelivered,
    #[strum(serialize = "message.read")]
    #[serde(rename = "message.read")]
    MessageRead,
    #[strum(serialize = "message.failed")]
    #[serde(rename = "message.failed")]
    MessageFailed,
}

impl EventType {
    /// Every event type, in taxonomy order.
    pub const ALL: [EventType; 13] = [
        EventType::ConnectionConnecting,
        EventType::ConnectionConnected,
        EventType::ConnectionDisconnected,
        EventType::ConnectionFailed,
        EventType::ConnectionLoggedOut,
        EventType::SessionQrScanned,
        EventType::SessionAuthenticated,
        EventType::SessionExpired,
        EventType::MessageReceived,
        EventType::MessageSent,
        EventType::MessageDelivered,
        EventType::MessageRead,
        EventType::MessageFailed,
    ];

    /// True for the `message.*` family, whose payloads carry chat JIDs.
    pub fn is_message(self) -> bool {
        matches!(
            self,
            EventType::MessageReceived
                | EventType::MessageSent
                | EventType::MessageDelivered
                | EventType::MessageRead
                | EventType::MessageFailed
        )
    }

    /// True for the `connection.*` family.
    pub fn is_connection(self) -> bool {
        matches!(
            self,
            EventType::ConnectionConnecting
                | EventType::ConnectionConnected
                | EventType::ConnectionDisconnected
                | EventType::ConnectionFailed
                | EventType::ConnectionLoggedOut
        )
    }
}

/// The canonical unit of propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique event ID.
    pub id: String,
    /// Event type from the closed taxonomy.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Owning session. Never empty.
    pub session_id: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Serialized payload; its schema depends on `event_type`.
    pub data: serde_json::Value,
}

impl Event {
    /// Build an event from an explicit ID.
    ///
    /// Fails if the ID or session ID is empty, or if the payload cannot be
    /// serialized (or serializes to `null`).
    pub fn new<T>(
        id: impl Into<String>,
        event_type: EventType,
        session_id: impl Into<String>,
        payload: &T,
    ) -> Result<Self, GatewayError>
    where
        T: Serialize + ?Sized,
    {
        let id = id.into();
        let session_id = session_id.into();

        if id.trim().is_empty() {
            return Err(GatewayError::EventConstruction {
                message: "event id must not be empty".to_string(),
                source: None,
            });
        }
        if session_id.trim().is_empty() {
            return Err(GatewayError::EventConstruction {
                message: format!("{event_type} event requires a session id"),
                source: None,
            });
        }

        let data = serde_json::to_value(payload).map_err(|e| GatewayError::EventConstruction {
            message: format!("failed to serialize {event_type} payload: {e}"),
            source: Some(Box::new(e)),
        })?;
        if data.is_null() {
            return Err(GatewayError::EventConstruction {
                message: format!("{event_type} payload serialized to null"),
                source: None,
            });
        }

        Ok(Self {
            id,
            event_type,
            session_id,
            timestamp: Utc::now(),
            data,
        })
    }

    /// Build an event with a freshly generated v4 UUID.
    pub fn generate<T>(
        event_type: EventType,
        session_id: impl Into<String>,
        payload: &T,
    ) -> Result<Self, GatewayError>
    where
        T: Serialize + ?Sized,
    {
        Self::new(uuid::Uuid::new_v4().to_string(), event_type, session_id, payload)
    }

    /// Serialize the full event as JSON bytes (webhook body, hub frame).
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, GatewayError> {
        serde_json::to_vec(self).map_err(|e| GatewayError::EventConstruction {
            message: format!("failed to serialize event {}: {e}", self.id),
            source: Some(Box::new(e)),
        })
    }

    /// The chat JID the event pertains to, for message events.
    pub fn chat_jid(&self) -> Option<&str> {
        self.data.get("chat_jid").and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to serialize"))
        }
    }

    #[test]
    fn event_type_strings_round_trip() {
        for ty in EventType::ALL {
            let s = ty.to_string();
            assert_eq!(EventType::from_str(&s).unwrap(), ty);
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{s}\""));
        }
    }

    #[test]
    fn event_type_families() {
        assert!(EventType::MessageRead.is_message());
        assert!(!EventType::MessageRead.is_connection());
        assert!(EventType::ConnectionFailed.is_connection());
        assert!(!EventType::SessionExpired.is_message());
        assert!(!EventType::SessionExpired.is_connection());
    }

    #[test]
    fn new_event_is_fully_populated() {
        let event = Event::new(
            "evt-1",
            EventType::ConnectionFailed,
            "s1",
            &serde_json::json!({"error_code": "X", "error_message": "y"}),
        )
        .unwrap();
        assert_eq!(event.id, "evt-1");
        assert_eq!(event.session_id, "s1");
        assert_eq!(event.event_type, EventType::ConnectionFailed);
        assert!(event.timestamp.timestamp() > 0);
        assert_eq!(event.data["error_code"], "X");
    }

    #[test]
    fn unserializable_payload_is_rejected() {
        let err = Event::generate(EventType::MessageReceived, "s1", &Unserializable).unwrap_err();
        assert!(matches!(err, GatewayError::EventConstruction { .. }));
        assert!(err.to_string().contains("message.received"));
    }

    #[test]
    fn null_payload_is_rejected() {
        let err = Event::generate(EventType::ConnectionConnected, "s1", &()).unwrap_err();
        assert!(matches!(err, GatewayError::EventConstruction { .. }));
    }

    #[test]
    fn empty_session_or_id_is_rejected() {
        assert!(Event::generate(EventType::ConnectionConnected, "", &serde_json::json!({})).is_err());
        assert!(Event::new("", EventType::ConnectionConnected, "s1", &serde_json::json!({})).is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut ids = std::collections::HashSet::new();
        for _ in 0..1000 {
            let e = Event::generate(EventType::MessageSent, "s1", &serde_json::json!({})).unwrap();
            assert!(ids.insert(e.id));
        }
    }

    #[test]
    fn serialized_event_uses_type_key() {
        let event = Event::generate(
            EventType::MessageReceived,
            "s1",
            &serde_json::json!({"chat_jid": "123@s.whatsapp.net"}),
        )
        .unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&event.to_json_bytes().unwrap()).unwrap();
        assert_eq!(value["type"], "message.received");
        assert_eq!(value["session_id"], "s1");
        assert_eq!(event.chat_jid(), Some("123@s.whatsapp.net"));
    }
}
