// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook delivery for the wagate session gateway.
//!
//! Each qualifying [`Event`](wagate_core::Event) is POSTed as JSON to the
//! session's configured URL. Deliveries are signed with HMAC-SHA256 when the
//! session has a secret, carry a Unix timestamp for replay protection, and
//! are retried with exponential backoff on 5xx and transport errors. A 4xx
//! response is a permanent rejection and is never retried.
//!
//! Delivery is best-effort: once attempts are exhausted the event is logged
//! and dropped.

pub mod filter;
pub mod publisher;
pub mod signer;

pub use filter::SkipReason;
pub use publisher::{DeliveryOutcome, WebhookPublisher, DEFAULT_WEBHOOK_POLICY};
pub use signer::{sign, verify, SIGNATURE_HEADER, TIMESTAMP_HEADER};
