use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::time::{Instant, sleep};
use tracing::{error, info, warn};

use crate::{
    clients::{circuit_breaker::CircuitBreaker, gateway::PushGateway, status::StatusPublisher},
    crypto::TokenCipher,
    metrics::Metrics,
    models::{
        gateway::GatewayResult,
        log::{NewNotificationLog, NotificationStatus},
        message::NotificationRequest,
        retry::RetryConfig,
        status::StatusUpdate,
        validation::validate_push_token,
    },
    stores::{CircuitBreakerStore, NotificationLogStore},
};

const MAX_RETRIES_EXCEEDED: &str = "Max retries exceeded";
const NOTIFICATION_TYPE_PUSH: &str = "push";

/// One of exactly three classes the consumer acts on; every failure is
/// resolved into success, retryable, or permanent before it leaves here.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Success,
    /// Worth redelivering through the broker.
    RetryableFailure(String),
    /// Dead-letter material; redelivery cannot help.
    PermanentFailure(String),
}

/// Turns one inbound message into a terminal, idempotent delivery outcome:
/// idempotency check against the log, retry loop with exponential backoff
/// through the circuit breaker, persisted state transitions, and a status
/// callback per terminal outcome.
pub struct NotificationProcessor<G, L, B, P> {
    gateway: G,
    log_store: L,
    breaker: CircuitBreaker<B>,
    status_publisher: P,
    cipher: TokenCipher,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl<G, L, B, P> NotificationProcessor<G, L, B, P>
where
    G: PushGateway,
    L: NotificationLogStore,
    B: CircuitBreakerStore,
    P: StatusPublisher,
{
    pub fn new(
        gateway: G,
        log_store: L,
        breaker: CircuitBreaker<B>,
        status_publisher: P,
        cipher: TokenCipher,
        metrics: Arc<Metrics>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            gateway,
            log_store,
            breaker,
            status_publisher,
            cipher,
            metrics,
            retry,
        }
    }

    pub async fn process(&self, payload: &[u8]) -> ProcessOutcome {
        let started = Instant::now();
        let outcome = self.process_inner(payload).await;
        self.metrics.record_duration(started.elapsed());
        outcome
    }

    async fn process_inner(&self, payload: &[u8]) -> ProcessOutcome {
        let value: JsonValue = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                self.metrics.record_error();
                warn!(error = %e, "Rejected undecodable message body");
                return ProcessOutcome::PermanentFailure(format!("Invalid JSON payload: {}", e));
            }
        };

        let request = match NotificationRequest::from_value(&value) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.record_error();
                warn!(error = %e, "Rejected invalid notification payload");
                return ProcessOutcome::PermanentFailure(e.to_string());
            }
        };

        info!(
            notification_id = %request.notification_id,
            user_id = %request.user_id,
            request_id = request.request_id.as_deref().unwrap_or_default(),
            "Processing push notification"
        );

        if let Err(e) = validate_push_token(&request.push_token) {
            self.metrics.record_error();
            warn!(
                notification_id = %request.notification_id,
                error = %e,
                "Rejected invalid device token"
            );
            return ProcessOutcome::PermanentFailure(format!("Invalid device token: {}", e));
        }

        let existing = match self.log_store.find(&request.notification_id).await {
            Ok(existing) => existing,
            Err(e) => {
                self.metrics.record_error();
                error!(
                    notification_id = %request.notification_id,
                    error = %e,
                    "Notification log lookup failed"
                );
                return ProcessOutcome::PermanentFailure(format!("Log lookup failed: {}", e));
            }
        };

        let starting_retry_count = match existing {
            Some(log) if log.status == NotificationStatus::Delivered => {
                info!(
                    notification_id = %request.notification_id,
                    "Notification already delivered, skipping"
                );
                return ProcessOutcome::Success;
            }
            // Crash-and-redelivery resumes where the persisted counter left
            // off instead of restarting the budget.
            Some(log) => log.retry_count,
            None => match self.create_pending_log(&request, &value).await {
                Ok(log) => log,
                Err(outcome) => return outcome,
            },
        };

        self.deliver(&request, starting_retry_count).await
    }

    async fn create_pending_log(
        &self,
        request: &NotificationRequest,
        original_payload: &JsonValue,
    ) -> Result<u32, ProcessOutcome> {
        let encrypted = self
            .cipher
            .encrypt(&request.push_token)
            .and_then(|token| {
                let metadata = self.cipher.encrypt(&original_payload.to_string())?;
                Ok((token, metadata))
            });

        let (push_token, metadata) = match encrypted {
            Ok(pair) => pair,
            Err(e) => {
                self.metrics.record_error();
                error!(
                    notification_id = %request.notification_id,
                    error = %e,
                    "Failed to encrypt notification payload"
                );
                return Err(ProcessOutcome::PermanentFailure(format!(
                    "Encryption failed: {}",
                    e
                )));
            }
        };

        let new_log = NewNotificationLog {
            notification_id: request.notification_id.clone(),
            notification_type: NOTIFICATION_TYPE_PUSH.to_string(),
            user_id: request.user_id.clone(),
            push_token: Some(push_token),
            metadata: Some(metadata),
        };

        match self.log_store.create_pending(new_log).await {
            // The upsert may return a row another consumer created first;
            // its counter is the one that matters.
            Ok(log) => Ok(log.retry_count),
            Err(e) => {
                self.metrics.record_error();
                error!(
                    notification_id = %request.notification_id,
                    error = %e,
                    "Failed to create notification log"
                );
                Err(ProcessOutcome::PermanentFailure(format!(
                    "Log creation failed: {}",
                    e
                )))
            }
        }
    }

    async fn deliver(&self, request: &NotificationRequest, retry_count: u32) -> ProcessOutcome {
        let mut attempt = retry_count;

        while attempt < self.retry.max_attempts {
            if self.breaker.is_open().await {
                warn!(
                    notification_id = %request.notification_id,
                    attempt,
                    "Push gateway circuit is open, counting attempt without calling gateway"
                );

                attempt += 1;
                self.persist_retry_count(&request.notification_id, attempt).await;
                self.metrics.record_retry();

                if attempt >= self.retry.max_attempts {
                    break;
                }
                self.backoff(&request.notification_id, attempt).await;
                continue;
            }

            match self.gateway.send(request).await {
                GatewayResult::Delivered { message_id } => {
                    self.breaker.record_success().await;

                    if let Err(e) = self
                        .log_store
                        .mark_delivered(&request.notification_id, attempt)
                        .await
                    {
                        // The user already has the notification; failing the
                        // message now would only risk a duplicate send.
                        error!(
                            notification_id = %request.notification_id,
                            error = %e,
                            "Failed to persist delivered status"
                        );
                    }

                    self.metrics.record_success();
                    info!(
                        notification_id = %request.notification_id,
                        message_id = message_id.as_deref().unwrap_or_default(),
                        retry_count = attempt,
                        "Notification delivered"
                    );

                    self.publish_status(&request.notification_id, NotificationStatus::Delivered, None)
                        .await;
                    return ProcessOutcome::Success;
                }

                GatewayResult::Rejected { reason } => {
                    self.persist_failed(&request.notification_id, &reason, attempt).await;
                    self.metrics.record_failure();
                    error!(
                        notification_id = %request.notification_id,
                        error = %reason,
                        "Notification rejected by gateway"
                    );

                    self.publish_status(
                        &request.notification_id,
                        NotificationStatus::Failed,
                        Some(reason.clone()),
                    )
                    .await;
                    return ProcessOutcome::PermanentFailure(reason);
                }

                GatewayResult::Unavailable { reason } => {
                    self.breaker.record_failure().await;
                    warn!(
                        notification_id = %request.notification_id,
                        attempt,
                        error = %reason,
                        "Transient gateway failure"
                    );

                    attempt += 1;
                    self.persist_retry_count(&request.notification_id, attempt).await;
                    self.metrics.record_retry();

                    if attempt >= self.retry.max_attempts {
                        break;
                    }
                    self.backoff(&request.notification_id, attempt).await;
                }
            }
        }

        self.persist_failed(&request.notification_id, MAX_RETRIES_EXCEEDED, attempt)
            .await;
        self.metrics.record_failure();
        error!(
            notification_id = %request.notification_id,
            retry_count = attempt,
            "Notification failed after exhausting retries"
        );

        self.publish_status(
            &request.notification_id,
            NotificationStatus::Failed,
            Some(MAX_RETRIES_EXCEEDED.to_string()),
        )
        .await;
        ProcessOutcome::PermanentFailure(MAX_RETRIES_EXCEEDED.to_string())
    }

    async fn backoff(&self, notification_id: &str, attempt: u32) {
        let delay = self.retry.backoff_delay(attempt);
        warn!(
            notification_id,
            attempt,
            delay_seconds = delay.as_secs(),
            "Backing off before retry"
        );
        sleep(delay).await;
    }

    async fn persist_retry_count(&self, notification_id: &str, retry_count: u32) {
        if let Err(e) = self
            .log_store
            .set_retry_count(notification_id, retry_count)
            .await
        {
            error!(notification_id, error = %e, "Failed to persist retry count");
        }
    }

    async fn persist_failed(&self, notification_id: &str, reason: &str, retry_count: u32) {
        if let Err(e) = self
            .log_store
            .mark_failed(notification_id, reason, retry_count)
            .await
        {
            error!(notification_id, error = %e, "Failed to persist failed status");
        }
    }

    /// Best effort: a lost status callback is logged and swallowed, never a
    /// pipeline failure.
    async fn publish_status(
        &self,
        notification_id: &str,
        status: NotificationStatus,
        error: Option<String>,
    ) {
        let update = StatusUpdate::new(notification_id, status, error);

        match self.status_publisher.publish(&update).await {
            Ok(()) => info!(notification_id, status = %status, "Status update sent"),
            Err(e) => warn!(notification_id, error = %e, "Failed to send status update"),
        }
    }
}
