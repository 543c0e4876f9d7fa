// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event buffering for the wagate session gateway.
//!
//! [`SessionEventQueue`] holds events for consumers that are temporarily
//! unreachable and hands them back, in order, when they become ready.

pub mod queue;

pub use queue::{SessionEventQueue, DEFAULT_QUEUE_CAPACITY};
