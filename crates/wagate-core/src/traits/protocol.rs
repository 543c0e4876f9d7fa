// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The lower-level WhatsApp protocol client, consumed as an opaque collaborator.

use async_trait::async_trait;

use crate::error::GatewayError;

/// Pairing, encryption and transport live behind this trait.
///
/// Inbound callbacks (QR scanned, authenticated, logged out, messages) are
/// delivered separately as [`ProtocolEvent`](crate::protocol::ProtocolEvent)s.
#[async_trait]
pub trait ProtocolClient: Send + Sync + 'static {
    /// Open (or resume) the transport for a session.
    async fn connect(&self, session_id: &str) -> Result<(), GatewayError>;

    /// Close the transport, keeping stored credentials.
    async fn disconnect(&self, session_id: &str) -> Result<(), GatewayError>;

    /// Whether the transport for `session_id` is currently up.
    fn is_connected(&self, session_id: &str) -> bool;

    /// The account JID, if the client knows it.
    async fn session_jid(&self, session_id: &str) -> Result<Option<String>, GatewayError>;
}
