// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock protocol client for deterministic testing.
//!
//! `MockProtocolClient` implements `ProtocolClient` with a script of connect
//! outcomes and records every call for assertion in tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use wagate_core::{GatewayError, ProtocolClient};

use crate::journal::Journal;

/// A scripted protocol client.
///
/// Connect outcomes are consumed from the script in order. Once the script
/// is empty, the fallback outcome applies (success unless
/// [`fail_by_default`](Self::fail_by_default) was called).
#[derive(Default)]
pub struct MockProtocolClient {
    script: Mutex<VecDeque<Result<(), String>>>,
    fallback_error: Mutex<Option<String>>,
    jid: Mutex<Option<String>>,
    connected: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    journal: Option<Journal>,
}

impl MockProtocolClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write every call into a shared journal.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::default()
        }
    }

    /// The JID reported by `session_jid` after a successful connect.
    pub fn set_jid(&self, jid: impl Into<String>) {
        *lock(&self.jid) = Some(jid.into());
    }

    /// Queue a successful connect.
    pub fn push_success(&self) {
        lock(&self.script).push_back(Ok(()));
    }

    /// Queue a failed connect with the given message.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.script).push_back(Err(message.into()));
    }

    /// Fail every connect not covered by the script.
    pub fn fail_by_default(&self, message: impl Into<String>) {
        *lock(&self.fallback_error) = Some(message.into());
    }

    /// Every call in order, e.g. `connect:s1`, `disconnect:s1`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of connect calls for `session_id`.
    pub fn connect_count(&self, session_id: &str) -> usize {
        let needle = format!("connect:{session_id}");
        lock(&self.calls).iter().filter(|c| **c == needle).count()
    }

    fn record(&self, entry: String) {
        if let Some(journal) = &self.journal {
            journal.record(entry.clone());
        }
        lock(&self.calls).push(entry);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl ProtocolClient for MockProtocolClient {
    async fn connect(&self, session_id: &str) -> Result<(), GatewayError> {
        self.record(format!("connect:{session_id}"));
        let scripted = lock(&self.script).pop_front();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => match lock(&self.fallback_error).clone() {
                Some(message) => Err(message),
                None => Ok(()),
            },
        };
        match outcome {
            Ok(()) => {
                lock(&self.connected).insert(session_id.to_string());
                Ok(())
            }
            Err(message) => Err(GatewayError::protocol(message)),
        }
    }

    async fn disconnect(&self, session_id: &str) -> Result<(), GatewayError> {
        self.record(format!("disconnect:{session_id}"));
        lock(&self.connected).remove(session_id);
        Ok(())
    }

    fn is_connected(&self, session_id: &str) -> bool {
        lock(&self.connected).contains(session_id)
    }

    async fn session_jid(&self, session_id: &str) -> Result<Option<String>, GatewayError> {
        if !self.is_connected(session_id) {
            return Ok(None);
        }
        Ok(lock(&self.jid).clone())
    }
}
