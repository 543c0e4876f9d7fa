// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JID classification by server suffix.

/// What kind of chat a JID addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JidKind {
    /// A one-to-one chat with a user.
    User,
    /// A group chat (`@g.us`).
    Group,
    /// A broadcast list or the status feed (`@broadcast`).
    Broadcast,
    /// A channel / newsletter (`@newsletter`).
    Channel,
    /// Anything without a recognized server part.
    Unknown,
}

impl JidKind {
    /// Classify a JID like `12345@s.whatsapp.net` or `1203630@g.us`.
    pub fn classify(jid: &str) -> Self {
        let Some((_, server)) = jid.rsplit_once('@') else {
            return JidKind::Unknown;
        };
        match server {
            "g.us" => JidKind::Group,
            "broadcast" => JidKind::Broadcast,
            "newsletter" => JidKind::Channel,
            "s.whatsapp.net" | "c.us" | "lid" => JidKind::User,
            _ => JidKind::Unknown,
        }
    }
}
