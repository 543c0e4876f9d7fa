// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model for the wagate gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]`, so a misspelled key is
//! reported at startup instead of silently ignored.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use wagate_core::{EventType, Session, WebhookConfig};
use wagate_resilience::RetryPolicy;

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WagateConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Dashboard WebSocket hub.
    #[serde(default)]
    pub hub: HubConfig,

    /// Per-session event queue.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Automatic session reconnects.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Webhook delivery.
    #[serde(default)]
    pub webhook: WebhookDeliveryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Sessions registered at startup.
    #[serde(default)]
    pub sessions: Vec<SessionSeed>,

    /// Static per-session webhook configuration.
    #[serde(default)]
    pub webhooks: Vec<WebhookEntry>,
}

/// HTTP listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8480
}

/// Dashboard hub protocol settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Key dashboards must present. Absent or empty accepts any key.
    #[serde(default)]
    pub shared_key: Option<String>,
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
    /// Frames buffered per dashboard before it is dropped as too slow.
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("shared_key", &self.shared_key.as_ref().map(|_| "[redacted]"))
            .field("auth_timeout_secs", &self.auth_timeout_secs)
            .field("ping_interval_secs", &self.ping_interval_secs)
            .field("write_timeout_secs", &self.write_timeout_secs)
            .field("client_buffer", &self.client_buffer)
            .finish()
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            shared_key: None,
            auth_timeout_secs: default_auth_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            client_buffer: default_client_buffer(),
        }
    }
}

impl HubConfig {
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

fn default_auth_timeout_secs() -> u64 {
    10
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_write_timeout_secs() -> u64 {
    10
}

fn default_client_buffer() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Events kept per session; the oldest are evicted beyond this.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1000
}

/// Reconnect backoff.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Attempts per reconnect cycle. 0 retries forever.
    #[serde(default = "default_reconnect_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_secs: default_reconnect_max_delay_secs(),
            max_attempts: default_reconnect_max_attempts(),
        }
    }
}

impl ReconnectConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_reconnect_max_delay_secs() -> u64 {
    60
}

fn default_reconnect_max_attempts() -> u32 {
    5
}

/// Webhook HTTP delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookDeliveryConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Total attempts per event, including the first.
    #[serde(default = "default_webhook_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_webhook_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for WebhookDeliveryConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_webhook_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_secs: default_webhook_max_delay_secs(),
        }
    }
}

impl WebhookDeliveryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_secs(self.max_delay_secs),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_webhook_max_attempts() -> u32 {
    3
}

fn default_webhook_max_delay_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level for wagate crates (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A session registered at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSeed {
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
}

impl SessionSeed {
    pub fn to_session(&self) -> Session {
        Session::new(
            self.id.clone(),
            self.name.clone().unwrap_or_else(|| self.id.clone()),
        )
    }
}

/// One `[[webhooks]]` entry.
///
/// Event names stay strings here so that validation can point at a typo.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookEntry {
    pub session_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub url: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub ignore_groups: bool,
    #[serde(default)]
    pub ignore_broadcasts: bool,
    #[serde(default)]
    pub ignore_channels: bool,
}

impl std::fmt::Debug for WebhookEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookEntry")
            .field("session_id", &self.session_id)
            .field("enabled", &self.enabled)
            .field("url", &self.url)
            .field("secret", &self.secret.as_ref().map(|_| "[redacted]"))
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

fn default_enabled() -> bool {
    true
}

impl WebhookEntry {
    /// Convert to the runtime form. Unknown event names are dropped; run
    /// validation first to reject them.
    pub fn to_webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            session_id: self.session_id.clone(),
            enabled: self.enabled,
            url: self.url.clone(),
            secret: self.secret.clone(),
            events: self
                .events
                .iter()
                .filter_map(|name| EventType::from_str(name).ok())
                .collect(),
            ignore_groups: self.ignore_groups,
            ignore_broadcasts: self.ignore_broadcasts,
            ignore_channels: self.ignore_channels,
        }
    }
}
