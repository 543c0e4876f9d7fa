// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the wagate session gateway.

use thiserror::Error;

use crate::session::SessionStatus;

/// The primary error type used across the gateway crates.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration errors (invalid TOML, bad values, missing fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// The protocol client is not wired in, so nothing can be connected.
    #[error("protocol client unavailable")]
    ClientUnavailable,

    /// The session is not known to the orchestrator or its repository.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// A status change that the session state machine does not allow.
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// The underlying protocol client failed to connect or disconnect.
    #[error("protocol error: {message}")]
    Protocol {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An event could not be built, usually because its payload failed to serialize.
    #[error("event construction failed: {message}")]
    EventConstruction {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Repository errors (session or webhook config persistence).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Webhook delivery errors.
    #[error("webhook error: {message}")]
    Webhook {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// WebSocket hub errors (bind failure, closed registry).
    #[error("hub error: {message}")]
    Hub { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable machine-readable code, used as `error_code` in `connection.failed` payloads.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::ClientUnavailable => "CLIENT_UNAVAILABLE",
            GatewayError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            GatewayError::InvalidTransition { .. } => "INVALID_TRANSITION",
            GatewayError::Protocol { .. } => "CONNECT_FAILED",
            GatewayError::EventConstruction { .. } => "EVENT_CONSTRUCTION_FAILED",
            GatewayError::Storage { .. } => "STORAGE_ERROR",
            GatewayError::Webhook { .. } => "WEBHOOK_FAILED",
            GatewayError::Hub { .. } => "HUB_ERROR",
            GatewayError::Timeout { .. } => "TIMEOUT",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Shorthand for a protocol error without an underlying source.
    pub fn protocol(message: impl Into<String>) -> Self {
        GatewayError::Protocol {
            message: message.into(),
            source: None,
        }
    }
}
