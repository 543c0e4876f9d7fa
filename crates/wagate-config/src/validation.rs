// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde cannot express. Every problem is collected
//! before returning.

use std::collections::HashSet;
use std::str::FromStr;

use wagate_core::EventType;

use crate::diagnostic::{ConfigError, suggest};
use crate::model::{WagateConfig, WebhookEntry};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &WagateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    }

    for (key, value) in [
        ("hub.auth_timeout_secs", config.hub.auth_timeout_secs),
        ("hub.ping_interval_secs", config.hub.ping_interval_secs),
        ("hub.write_timeout_secs", config.hub.write_timeout_secs),
        ("reconnect.base_delay_ms", config.reconnect.base_delay_ms),
        ("reconnect.max_delay_secs", config.reconnect.max_delay_secs),
        ("webhook.request_timeout_secs", config.webhook.request_timeout_secs),
        ("webhook.base_delay_ms", config.webhook.base_delay_ms),
        ("webhook.max_delay_secs", config.webhook.max_delay_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{key} must be greater than 0")));
        }
    }

    if config.hub.client_buffer == 0 {
        errors.push(ConfigError::validation("hub.client_buffer must be greater than 0"));
    }
    if config.queue.capacity == 0 {
        errors.push(ConfigError::validation("queue.capacity must be greater than 0"));
    }
    if config.webhook.max_attempts == 0 {
        errors.push(ConfigError::validation("webhook.max_attempts must be at least 1"));
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.level `{}` is not one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    let mut seen = HashSet::new();
    for seed in &config.sessions {
        if seed.id.trim().is_empty() {
            errors.push(ConfigError::validation("sessions.id must not be empty"));
        } else if !seen.insert(seed.id.as_str()) {
            errors.push(ConfigError::validation(format!(
                "session id `{}` is declared more than once",
                seed.id
            )));
        }
    }

    let mut hooked = HashSet::new();
    for entry in &config.webhooks {
        validate_webhook(entry, &mut errors);
        if !entry.session_id.trim().is_empty() && !hooked.insert(entry.session_id.as_str()) {
            errors.push(ConfigError::validation(format!(
                "session `{}` has more than one webhook entry",
                entry.session_id
            )));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_webhook(entry: &WebhookEntry, errors: &mut Vec<ConfigError>) {
    if entry.session_id.trim().is_empty() {
        errors.push(ConfigError::validation("webhooks.session_id must not be empty"));
    }

    let url = entry.url.trim();
    let has_host = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty());
    if !has_host {
        errors.push(ConfigError::validation(format!(
            "webhook url `{}` for session `{}` must start with http:// or https://",
            entry.url, entry.session_id
        )));
    }

    for name in &entry.events {
        if EventType::from_str(name).is_err() {
            let names: Vec<String> = EventType::ALL.iter().map(|t| t.to_string()).collect();
            errors.push(ConfigError::UnknownEvent {
                session_id: entry.session_id.clone(),
                name: name.clone(),
                suggestion: suggest(name, names.iter().map(String::as_str)),
                known: names.join(", "),
            });
        }
    }
}
