// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decides whether an event goes out to a session's webhook.

use std::fmt;

use wagate_core::{Event, JidKind, WebhookConfig};

/// Why an event was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The session has no webhook configured.
    NotConfigured,
    /// The config store could not be read.
    ConfigUnavailable,
    Disabled,
    /// The event type is not in the subscription list.
    NotSubscribed,
    /// The event's chat kind is ignored by the config.
    IgnoredChat(JidKind),
    /// The event could not be serialized into a body.
    Unserializable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotConfigured => write!(f, "no webhook configured"),
            SkipReason::ConfigUnavailable => write!(f, "webhook config unavailable"),
            SkipReason::Disabled => write!(f, "webhook disabled"),
            SkipReason::NotSubscribed => write!(f, "event type not subscribed"),
            SkipReason::IgnoredChat(kind) => write!(f, "{kind:?} chats ignored"),
            SkipReason::Unserializable => write!(f, "event not serializable"),
        }
    }
}

/// Return the config if `event` should be delivered through it.
pub fn admit<'a>(
    config: Option<&'a WebhookConfig>,
    event: &Event,
) -> Result<&'a WebhookConfig, SkipReason> {
    let config = config.ok_or(SkipReason::NotConfigured)?;
    if !config.enabled {
        return Err(SkipReason::Disabled);
    }
    if !config.subscribes_to(event.event_type) {
        return Err(SkipReason::NotSubscribed);
    }
    if config.ignores_chat(event) {
        let kind = event.chat_jid().map(JidKind::classify).unwrap_or(JidKind::Unknown);
        return Err(SkipReason::IgnoredChat(kind));
    }
    Ok(config)
}
