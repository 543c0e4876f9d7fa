// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for wagate integration tests.
//!
//! Provides scripted collaborators so session, hub and dispatcher tests run
//! deterministically without a real protocol client.
//!
//! # Components
//!
//! - [`MockProtocolClient`] - Protocol client with scripted connect results
//! - [`RecordingSink`] - Event sink that captures everything published to it
//! - [`Journal`] - Shared ordered log for asserting cross-component ordering

pub mod journal;
pub mod mock_protocol;
pub mod recording_sink;

pub use journal::Journal;
pub use mock_protocol::MockProtocolClient;
pub use recording_sink::RecordingSink;
