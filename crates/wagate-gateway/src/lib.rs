// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event distribution for the wagate session gateway.
//!
//! - [`EventHub`] broadcasts events to authenticated WebSocket dashboards.
//! - [`ws`] speaks the per-connection auth / ping / broadcast protocol.
//! - [`server`] exposes `/ws` and `/health` over axum.
//! - [`EventDispatcher`] is the single `Publish(event)` entry point that fans
//!   each event out to the hub (or the per-session queue while no dashboard
//!   is listening) and to the webhook publisher.

pub mod dispatcher;
pub mod hub;
pub mod server;
pub mod ws;

pub use dispatcher::EventDispatcher;
pub use hub::{ClientBacklog, ClientId, EventHub, HubClient, HubSettings};
pub use server::{bind, router, serve, AppState};
