// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session connection orchestration for the wagate gateway.
//!
//! The [`SessionOrchestrator`] owns one state machine per session and drives
//! connect / reconnect / disconnect against the external protocol client.
//! Every transition, success or failure, is published as an
//! [`Event`](wagate_core::Event), so the session's state is always observable
//! through the event stream.
//!
//! Inbound protocol occurrences (pairing progress, logouts, transport drops,
//! message traffic) are consumed by [`SessionOrchestrator::run`] from a
//! single channel of [`ProtocolEvent`](wagate_core::ProtocolEvent)s.

pub mod handler;
pub mod orchestrator;

pub use orchestrator::{
    SessionOrchestrator, SessionOrchestratorBuilder, DEFAULT_RECONNECT_POLICY,
};
