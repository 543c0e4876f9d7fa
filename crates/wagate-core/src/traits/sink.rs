// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entry point of the distribution pipeline.

use crate::event::Event;

/// Anything producers can push events into.
///
/// `publish` must not block on slow consumers: implementations hand the
/// event off (queue, per-client buffers, spawned deliveries) and return.
pub trait EventSink: Send + Sync + 'static {
    fn publish(&self, event: Event);
}
