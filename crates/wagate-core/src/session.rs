// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session record and its connection state machine.
//!
//! ```text
//! Pending -> Connecting -> Connected -> Disconnected -> Connecting ...
//!                     \            \-> LoggedOut
//!                      \-> Disconnected / LoggedOut
//! ```
//!
//! `LoggedOut` only leaves via an explicit new pairing (`Connecting`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::GatewayError;

/// Connection status of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Connecting,
    Connected,
    Disconnected,
    LoggedOut,
}

impl SessionStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, Connecting)
                | (Pending, LoggedOut)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connecting, LoggedOut)
                | (Connected, Connecting)
                | (Connected, Disconnected)
                | (Connected, LoggedOut)
                | (Disconnected, Connecting)
                | (Disconnected, LoggedOut)
                | (LoggedOut, Connecting)
        )
    }

    /// Connected or in the middle of connecting.
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Connecting | SessionStatus::Connected)
    }
}

/// One logical WhatsApp account managed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    /// Account JID; `None` until the session first connects.
    pub jid: Option<String>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A new session in the `Pending` state.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            jid: None,
            status: SessionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    ///
    /// Entering `Connected` must go through [`Session::mark_connected`].
    pub fn transition(&mut self, next: SessionStatus) -> Result<(), GatewayError> {
        if next == SessionStatus::Connected || !self.status.can_transition_to(next) {
            return Err(GatewayError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `Connected`, recording the JID if the client supplied one.
    ///
    /// A `None` JID keeps whatever was stored from an earlier connection.
    pub fn mark_connected(&mut self, jid: Option<String>) -> Result<(), GatewayError> {
        if !self.status.can_transition_to(SessionStatus::Connected) {
            return Err(GatewayError::InvalidTransition {
                from: self.status,
                to: SessionStatus::Connected,
            });
        }
        if let Some(jid) = jid.filter(|j| !j.is_empty()) {
            self.jid = Some(jid);
        }
        self.status = SessionStatus::Connected;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const ALL: [SessionStatus; 5] = [
        SessionStatus::Pending,
        SessionStatus::Connecting,
        SessionStatus::Connected,
        SessionStatus::Disconnected,
        SessionStatus::LoggedOut,
    ];

    #[test]
    fn status_display_round_trips() {
        for status in ALL {
            let s = status.to_string();
            assert_eq!(SessionStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(SessionStatus::LoggedOut.to_string(), "logged_out");
    }

    #[test]
    fn happy_path_sets_jid_on_connect() {
        let mut session = Session::new("s1", "Support line");
        assert_eq!(session.status, SessionStatus::Pending);
        assert!(session.jid.is_none());

        session.transition(SessionStatus::Connecting).unwrap();
        session
            .mark_connected(Some("491234@s.whatsapp.net".into()))
            .unwrap();
        assert_eq!(session.status, SessionStatus::Connected);
        assert_eq!(session.jid.as_deref(), Some("491234@s.whatsapp.net"));
    }

    #[test]
    fn disconnect_keeps_jid() {
        let mut session = Session::new("s1", "x");
        session.transition(SessionStatus::Connecting).unwrap();
        session.mark_connected(Some("a@s.whatsapp.net".into())).unwrap();
        session.transition(SessionStatus::Disconnected).unwrap();
        assert_eq!(session.jid.as_deref(), Some("a@s.whatsapp.net"));

        session.transition(SessionStatus::Connecting).unwrap();
        session.mark_connected(None).unwrap();
        assert_eq!(session.jid.as_deref(), Some("a@s.whatsapp.net"));
    }

    #[test]
    fn connected_only_reachable_from_connecting() {
        for from in ALL {
            let allowed = from.can_transition_to(SessionStatus::Connected);
            assert_eq!(allowed, from == SessionStatus::Connecting, "from {from}");
        }
    }

    #[test]
    fn transition_refuses_direct_connected() {
        let mut session = Session::new("s1", "x");
        session.transition(SessionStatus::Connecting).unwrap();
        let err = session.transition(SessionStatus::Connected).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidTransition { .. }));
        assert_eq!(session.status, SessionStatus::Connecting);
    }

    #[test]
    fn logged_out_only_leaves_through_connecting() {
        for to in ALL {
            let allowed = SessionStatus::LoggedOut.can_transition_to(to);
            assert_eq!(allowed, to == SessionStatus::Connecting, "to {to}");
        }
    }

    #[test]
    fn no_self_transitions() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }
}
