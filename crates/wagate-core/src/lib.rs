// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the wagate session gateway.
//!
//! This crate holds the types every other crate agrees on: the normalized
//! [`Event`] that flows from producers to the hub and webhook publisher, the
//! [`Session`] state word owned by the connection orchestrator, the
//! [`GatewayError`] taxonomy, and the traits the gateway consumes from its
//! external collaborators (protocol client, repositories).

pub mod error;
pub mod event;
pub mod jid;
pub mod memory;
pub mod payload;
pub mod protocol;
pub mod session;
pub mod traits;
pub mod webhook;

pub use error::GatewayError;
pub use event::{Event, EventType};
pub use jid::JidKind;
pub use protocol::{MessageDirection, ProtocolEvent, ReceiptKind};
pub use session::{Session, SessionStatus};
pub use webhook::WebhookConfig;

pub use traits::{EventSink, ProtocolClient, SessionRepository, WebhookConfigStore};
