// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the gateway core and its collaborators.
//!
//! Async traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod protocol;
pub mod repository;
pub mod sink;

pub use protocol::ProtocolClient;
pub use repository::{SessionRepository, WebhookConfigStore};
pub use sink::EventSink;
