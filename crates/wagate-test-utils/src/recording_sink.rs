// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event sink that captures published events.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use wagate_core::{Event, EventSink, EventType};

use crate::journal::Journal;

/// Captures every published event in order.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
    notify: Arc<Notify>,
    journal: Option<Journal>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write `event:<type>` entries into a shared journal.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Event types published for one session, in order.
    pub fn types_for(&self, session_id: &str) -> Vec<EventType> {
        self.events()
            .into_iter()
            .filter(|e| e.session_id == session_id)
            .map(|e| e.event_type)
            .collect()
    }

    /// Wait until at least `count` events were published, or `timeout` elapses.
    ///
    /// Returns whether the count was reached.
    pub async fn wait_for_count(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if self.len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: Event) {
        if let Some(journal) = &self.journal {
            journal.record(format!("event:{}", event.event_type));
        }
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventType, session: &str) -> Event {
        Event::generate(kind, session, &serde_json::json!({})).unwrap()
    }

    #[tokio::test]
    async fn records_in_order_and_filters_by_session() {
        let sink = RecordingSink::new();
        sink.publish(event(EventType::ConnectionConnecting, "a"));
        sink.publish(event(EventType::ConnectionConnecting, "b"));
        sink.publish(event(EventType::ConnectionConnected, "a"));

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.types_for("a"),
            vec![EventType::ConnectionConnecting, EventType::ConnectionConnected]
        );
    }

    #[tokio::test]
    async fn wait_for_count_wakes_on_publish() {
        let sink = RecordingSink::new();
        let producer = sink.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.publish(event(EventType::SessionQrScanned, "a"));
        });
        assert!(sink.wait_for_count(1, Duration::from_secs(5)).await);
        assert!(!sink.wait_for_count(2, Duration::from_millis(50)).await);
    }
}
