// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for the wagate session gateway.
//!
//! - [`backoff`]: exponential delay with a cap.
//! - [`retry`]: a bounded attempt policy and a cancellable sleep built on it.

pub mod backoff;
pub mod retry;

pub use backoff::{calculate_backoff, calculate_backoff_with_base};
pub use retry::{sleep_or_cancel, RetryPolicy};
