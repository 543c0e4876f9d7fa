// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound occurrences reported by the protocol client.
//!
//! The client pushes these over a single channel that the session
//! orchestrator drains in its own processing loop.

use crate::payload::{MessagePayload, ReceiptPayload};

/// Whether a message was received from a peer or sent by this account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Receipt flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptKind {
    Delivered,
    Read,
    Failed,
}

/// A tagged protocol-level occurrence for one session.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// The pairing QR code was scanned by the phone.
    QrScanned { session_id: String },
    /// The pairing window closed before the QR code was scanned.
    QrExpired { session_id: String },
    /// Pairing completed and the account JID is known.
    Authenticated { session_id: String, jid: String },
    /// The remote side revoked the session.
    LoggedOut {
        session_id: String,
        reason: Option<String>,
    },
    /// The transport dropped while connected.
    StreamDisconnected { session_id: String, reason: String },
    /// A message was received or sent.
    Message {
        session_id: String,
        direction: MessageDirection,
        message: MessagePayload,
    },
    /// A delivery/read/failure receipt arrived.
    Receipt {
        session_id: String,
        kind: ReceiptKind,
        receipt: ReceiptPayload,
    },
}

impl ProtocolEvent {
    /// The session this occurrence belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            ProtocolEvent::QrScanned { session_id }
            | ProtocolEvent::QrExpired { session_id }
            | ProtocolEvent::Authenticated { session_id, .. }
            | ProtocolEvent::LoggedOut { session_id, .. }
            | ProtocolEvent::StreamDisconnected { session_id, .. }
            | ProtocolEvent::Message { session_id, .. }
            | ProtocolEvent::Receipt { session_id, .. } => session_id,
        }
    }
}
