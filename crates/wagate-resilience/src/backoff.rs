// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff with a ceiling.

use std::time::Duration;

/// Next delay after `current`: `min(current * 2, max_delay)`.
pub fn calculate_backoff(current: Duration, max_delay: Duration) -> Duration {
    current.saturating_mul(2).min(max_delay)
}

/// `base` doubled `attempt` times, capped at `max_delay`.
///
/// `attempt == 0` returns `base` (still capped). Saturates instead of
/// overflowing for large attempt numbers.
pub fn calculate_backoff_with_base(base: Duration, attempt: u32, max_delay: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max_delay)
}
