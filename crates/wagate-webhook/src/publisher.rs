// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed HTTP delivery with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use wagate_core::{Event, EventSink, GatewayError, WebhookConfigStore};
use wagate_resilience::{sleep_or_cancel, RetryPolicy};

use crate::filter::{admit, SkipReason};
use crate::signer::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Three attempts, 1s base, doubling, 30s cap.
pub const DEFAULT_WEBHOOK_POLICY: RetryPolicy = RetryPolicy {
    max_attempts: 3,
    base_delay: Duration::from_secs(1),
    max_delay: Duration::from_secs(30),
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of delivering one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered 2xx.
    Delivered { attempts: u32, status: u16 },
    /// The endpoint answered 4xx; not retried.
    Rejected { status: u16 },
    /// Every attempt failed with 5xx or a transport error.
    Exhausted { attempts: u32 },
    /// Filtered out before any request was made.
    Skipped(SkipReason),
    /// Shutdown interrupted a retry wait.
    Cancelled { attempts: u32 },
}

/// Result of a single POST.
enum AttemptResult {
    Success(StatusCode),
    Permanent(StatusCode),
    Transient(String),
}

/// Delivers events to per-session webhook endpoints.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct WebhookPublisher {
    client: reqwest::Client,
    store: Arc<dyn WebhookConfigStore>,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl WebhookPublisher {
    /// Publisher with the default retry policy and a 10s request timeout.
    pub fn new(store: Arc<dyn WebhookConfigStore>) -> Result<Self, GatewayError> {
        Self::with_settings(store, DEFAULT_WEBHOOK_POLICY, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_settings(
        store: Arc<dyn WebhookConfigStore>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("wagate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Webhook {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            store,
            policy,
            shutdown: CancellationToken::new(),
        })
    }

    /// Tie pending retry waits to `token`.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Cancel every pending retry wait. In-flight requests finish on their own.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Deliver `event` on a background task.
    pub fn publish(&self, event: Event) -> JoinHandle<DeliveryOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.deliver(&event).await })
    }

    /// Filter, sign and POST `event`, retrying transient failures.
    ///
    /// Attempts for one event are strictly sequential.
    pub async fn deliver(&self, event: &Event) -> DeliveryOutcome {
        let session_id = event.session_id.as_str();
        let config = match self.store.get(session_id).await {
            Ok(config) => config,
            Err(e) => {
                error!(session_id, event_id = %event.id, error = %e, "failed to read webhook config");
                return DeliveryOutcome::Skipped(SkipReason::ConfigUnavailable);
            }
        };
        let config = match admit(config.as_ref(), event) {
            Ok(config) => config,
            Err(reason) => {
                debug!(session_id, event_id = %event.id, %reason, "webhook delivery skipped");
                return DeliveryOutcome::Skipped(reason);
            }
        };

        let body = match event.to_json_bytes() {
            Ok(body) => body,
            Err(e) => {
                error!(session_id, event_id = %event.id, error = %e, "cannot serialize webhook body");
                return DeliveryOutcome::Skipped(SkipReason::Unserializable);
            }
        };
        let signature = match config.signing_secret().map(|secret| sign(secret, &body)) {
            None => None,
            Some(Ok(signature)) => Some(signature),
            Some(Err(e)) => {
                error!(session_id, event_id = %event.id, error = %e, "cannot sign webhook body");
                return DeliveryOutcome::Skipped(SkipReason::Unserializable);
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self
                .send_once(&config.url, &body, signature.as_deref())
                .await
            {
                AttemptResult::Success(status) => {
                    info!(
                        session_id,
                        event_id = %event.id,
                        event_type = %event.event_type,
                        status = status.as_u16(),
                        attempt,
                        "webhook delivered"
                    );
                    return DeliveryOutcome::Delivered {
                        attempts: attempt,
                        status: status.as_u16(),
                    };
                }
                AttemptResult::Permanent(status) => {
                    error!(
                        session_id,
                        event_id = %event.id,
                        status = status.as_u16(),
                        "webhook rejected by endpoint, not retrying"
                    );
                    return DeliveryOutcome::Rejected {
                        status: status.as_u16(),
                    };
                }
                AttemptResult::Transient(failure) => failure,
            };

            if !self.policy.should_retry(attempt) {
                error!(
                    session_id,
                    event_id = %event.id,
                    attempts = attempt,
                    error = %failure,
                    "webhook delivery failed, attempts exhausted"
                );
                return DeliveryOutcome::Exhausted { attempts: attempt };
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                session_id,
                event_id = %event.id,
                attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %failure,
                "webhook delivery failed, retrying"
            );
            if !sleep_or_cancel(delay, &self.shutdown).await {
                warn!(session_id, event_id = %event.id, "webhook retry abandoned on shutdown");
                return DeliveryOutcome::Cancelled { attempts: attempt };
            }
        }
    }

    async fn send_once(&self, url: &str, body: &[u8], signature: Option<&str>) -> AttemptResult {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(TIMESTAMP_HEADER, chrono::Utc::now().timestamp().to_string())
            .body(body.to_vec());
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        match request.send().await {
            Ok(response) => classify(response.status()),
            Err(e) => AttemptResult::Transient(format!("request failed: {e}")),
        }
    }
}

fn classify(status: StatusCode) -> AttemptResult {
    if status.is_success() {
        AttemptResult::Success(status)
    } else if status.is_client_error() {
        AttemptResult::Permanent(status)
    } else {
        AttemptResult::Transient(format!("endpoint returned {status}"))
    }
}

impl EventSink for WebhookPublisher {
    fn publish(&self, event: Event) {
        drop(WebhookPublisher::publish(self, event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_waits_one_then_two_seconds() {
        assert_eq!(DEFAULT_WEBHOOK_POLICY.max_attempts, 3);
        assert_eq!(DEFAULT_WEBHOOK_POLICY.delay_after(1), Duration::from_secs(1));
        assert_eq!(DEFAULT_WEBHOOK_POLICY.delay_after(2), Duration::from_secs(2));
        assert!(DEFAULT_WEBHOOK_POLICY.should_retry(2));
        assert!(!DEFAULT_WEBHOOK_POLICY.should_retry(3));
    }

    #[test]
    fn status_classes() {
        assert!(matches!(classify(StatusCode::OK), AttemptResult::Success(_)));
        assert!(matches!(classify(StatusCode::NO_CONTENT), AttemptResult::Success(_)));
        assert!(matches!(classify(StatusCode::BAD_REQUEST), AttemptResult::Permanent(_)));
        assert!(matches!(classify(StatusCode::UNAUTHORIZED), AttemptResult::Permanent(_)));
        assert!(matches!(
            classify(StatusCode::INTERNAL_SERVER_ERROR),
            AttemptResult::Transient(_)
        ));
        assert!(matches!(
            classify(StatusCode::SERVICE_UNAVAILABLE),
            AttemptResult::Transient(_)
        ));
    }
}
