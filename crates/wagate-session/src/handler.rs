// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Processing loop for protocol-level occurrences.

use tokio::sync::mpsc;
use tracing::{info, warn};

use wagate_core::payload::{MessagePayload, ReceiptPayload};
use wagate_core::{EventType, MessageDirection, ProtocolEvent, ReceiptKind};

use crate::orchestrator::SessionOrchestrator;

impl SessionOrchestrator {
    /// Drain protocol events until the channel closes or the orchestrator shuts down.
    ///
    /// Events are handled one at a time, so occurrences for the same session
    /// are applied in the order the client reported them.
    pub async fn run(&self, mut events: mpsc::Receiver<ProtocolEvent>) {
        info!("protocol event loop started");
        let shutdown = self.shutdown_token().clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = events.recv() => match next {
                    Some(event) => self.handle_protocol_event(event).await,
                    None => break,
                },
            }
        }
        info!("protocol event loop stopped");
    }

    /// Apply a single protocol occurrence.
    pub async fn handle_protocol_event(&self, event: ProtocolEvent) {
        match event {
            ProtocolEvent::QrScanned { session_id } => self.handle_qr_scanned(&session_id),
            ProtocolEvent::QrExpired { session_id } => self.handle_qr_expired(&session_id),
            ProtocolEvent::Authenticated { session_id, jid } => {
                self.handle_authenticated(&session_id, &jid)
            }
            ProtocolEvent::LoggedOut { session_id, reason } => {
                if let Err(e) = self.handle_logout(&session_id, reason).await {
                    warn!(session_id, error = %e, "failed to apply logout");
                }
            }
            ProtocolEvent::StreamDisconnected { session_id, reason } => {
                if let Err(e) = self.handle_stream_disconnected(&session_id, &reason).await {
                    warn!(session_id, error = %e, "failed to apply stream disconnect");
                }
            }
            ProtocolEvent::Message {
                session_id,
                direction,
                message,
            } => self.handle_message(&session_id, direction, &message),
            ProtocolEvent::Receipt {
                session_id,
                kind,
                receipt,
            } => self.handle_receipt(&session_id, kind, &receipt),
        }
    }

    /// Publish `message.received` or `message.sent`.
    pub fn handle_message(
        &self,
        session_id: &str,
        direction: MessageDirection,
        message: &MessagePayload,
    ) {
        let event_type = match direction {
            MessageDirection::Inbound => EventType::MessageReceived,
            MessageDirection::Outbound => EventType::MessageSent,
        };
        self.emit(event_type, session_id, message);
    }

    /// Publish `message.delivered`, `message.read` or `message.failed`.
    pub fn handle_receipt(&self, session_id: &str, kind: ReceiptKind, receipt: &ReceiptPayload) {
        if receipt.message_ids.is_empty() {
            warn!(session_id, ?kind, "ignoring receipt without message ids");
            return;
        }
        let event_type = match kind {
            ReceiptKind::Delivered => EventType::MessageDelivered,
            ReceiptKind::Read => EventType::MessageRead,
            ReceiptKind::Failed => EventType::MessageFailed,
        };
        self.emit(event_type, session_id, receipt);
    }
}
