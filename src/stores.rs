use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Error, Result, anyhow};
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    circuit_breaker::CircuitState,
    log::{NewNotificationLog, NotificationLog, NotificationStatus},
};

/// Shared circuit-breaker state, one entry set per guarded service name.
///
/// Implementations must provide atomic increment-with-expiry so concurrent
/// consumer processes count failures correctly against the same service.
#[allow(async_fn_in_trait)]
pub trait CircuitBreakerStore {
    async fn state(&self, service: &str) -> Result<Option<CircuitState>, Error>;

    /// Write the state, optionally with a time-to-live after which the entry
    /// self-expires back to absent (read as closed).
    async fn set_state(
        &self,
        service: &str,
        state: CircuitState,
        ttl: Option<Duration>,
    ) -> Result<(), Error>;

    /// Atomically increment the failure counter, refreshing its expiry, and
    /// return the post-increment count.
    async fn increment_failures(&self, service: &str, expiry: Duration) -> Result<u32, Error>;

    async fn clear_failures(&self, service: &str) -> Result<(), Error>;

    async fn opened_at(&self, service: &str) -> Result<Option<u64>, Error>;

    async fn set_opened_at(&self, service: &str, unix_seconds: u64) -> Result<(), Error>;

    async fn clear_opened_at(&self, service: &str) -> Result<(), Error>;
}

/// Durable notification delivery log keyed by `notification_id`.
///
/// `create_pending` must behave as a unique-key upsert: when two consumers
/// race on the same id, both see the single surviving row.
#[allow(async_fn_in_trait)]
pub trait NotificationLogStore {
    async fn find(&self, notification_id: &str) -> Result<Option<NotificationLog>, Error>;

    async fn create_pending(&self, new: NewNotificationLog) -> Result<NotificationLog, Error>;

    async fn set_retry_count(&self, notification_id: &str, retry_count: u32) -> Result<(), Error>;

    async fn mark_delivered(&self, notification_id: &str, retry_count: u32) -> Result<(), Error>;

    async fn mark_failed(
        &self,
        notification_id: &str,
        error_message: &str,
        retry_count: u32,
    ) -> Result<(), Error>;
}

#[derive(Debug)]
struct StateEntry {
    state: CircuitState,
    expires_at: Option<Instant>,
}

#[derive(Debug)]
struct FailureCounter {
    count: u32,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct BreakerInner {
    states: HashMap<String, StateEntry>,
    failures: HashMap<String, FailureCounter>,
    opened_at: HashMap<String, u64>,
}

/// In-memory circuit-breaker store. Suitable for a single process and for
/// exercising the breaker logic in tests; clones share state.
#[derive(Clone, Default)]
pub struct InMemoryCircuitBreakerStore {
    inner: Arc<Mutex<BreakerInner>>,
}

impl InMemoryCircuitBreakerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CircuitBreakerStore for InMemoryCircuitBreakerStore {
    async fn state(&self, service: &str) -> Result<Option<CircuitState>, Error> {
        let mut inner = self.lock();

        let expired = match inner.states.get(service) {
            Some(entry) => entry
                .expires_at
                .is_some_and(|deadline| Instant::now() >= deadline),
            None => return Ok(None),
        };

        if expired {
            inner.states.remove(service);
            return Ok(None);
        }

        Ok(inner.states.get(service).map(|entry| entry.state))
    }

    async fn set_state(
        &self,
        service: &str,
        state: CircuitState,
        ttl: Option<Duration>,
    ) -> Result<(), Error> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.lock()
            .states
            .insert(service.to_string(), StateEntry { state, expires_at });
        Ok(())
    }

    async fn increment_failures(&self, service: &str, expiry: Duration) -> Result<u32, Error> {
        let mut inner = self.lock();
        let now = Instant::now();

        let counter = inner
            .failures
            .entry(service.to_string())
            .and_modify(|counter| {
                if now >= counter.expires_at {
                    counter.count = 0;
                }
                counter.count += 1;
                counter.expires_at = now + expiry;
            })
            .or_insert(FailureCounter {
                count: 1,
                expires_at: now + expiry,
            });

        Ok(counter.count)
    }

    async fn clear_failures(&self, service: &str) -> Result<(), Error> {
        self.lock().failures.remove(service);
        Ok(())
    }

    async fn opened_at(&self, service: &str) -> Result<Option<u64>, Error> {
        Ok(self.lock().opened_at.get(service).copied())
    }

    async fn set_opened_at(&self, service: &str, unix_seconds: u64) -> Result<(), Error> {
        self.lock().opened_at.insert(service.to_string(), unix_seconds);
        Ok(())
    }

    async fn clear_opened_at(&self, service: &str) -> Result<(), Error> {
        self.lock().opened_at.remove(service);
        Ok(())
    }
}

/// In-memory notification log. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryNotificationLogStore {
    inner: Arc<Mutex<HashMap<String, NotificationLog>>>,
}

impl InMemoryNotificationLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, NotificationLog>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl NotificationLogStore for InMemoryNotificationLogStore {
    async fn find(&self, notification_id: &str) -> Result<Option<NotificationLog>, Error> {
        Ok(self.lock().get(notification_id).cloned())
    }

    async fn create_pending(&self, new: NewNotificationLog) -> Result<NotificationLog, Error> {
        let mut inner = self.lock();

        let log = inner
            .entry(new.notification_id.clone())
            .or_insert_with(|| NotificationLog {
                id: Uuid::new_v4(),
                notification_id: new.notification_id.clone(),
                notification_type: new.notification_type,
                user_id: new.user_id,
                push_token: new.push_token,
                metadata: new.metadata,
                status: NotificationStatus::Pending,
                error_message: None,
                retry_count: 0,
                sent_at: None,
                delivered_at: None,
                created_at: Utc::now(),
            });

        Ok(log.clone())
    }

    async fn set_retry_count(&self, notification_id: &str, retry_count: u32) -> Result<(), Error> {
        let mut inner = self.lock();
        let log = inner
            .get_mut(notification_id)
            .ok_or_else(|| anyhow!("Notification log not found: {}", notification_id))?;

        log.retry_count = retry_count;
        Ok(())
    }

    async fn mark_delivered(&self, notification_id: &str, retry_count: u32) -> Result<(), Error> {
        let mut inner = self.lock();
        let log = inner
            .get_mut(notification_id)
            .ok_or_else(|| anyhow!("Notification log not found: {}", notification_id))?;

        let now = Utc::now();
        log.status = NotificationStatus::Delivered;
        log.retry_count = retry_count;
        log.sent_at = Some(now);
        log.delivered_at = Some(now);
        Ok(())
    }

    async fn mark_failed(
        &self,
        notification_id: &str,
        error_message: &str,
        retry_count: u32,
    ) -> Result<(), Error> {
        let mut inner = self.lock();
        let log = inner
            .get_mut(notification_id)
            .ok_or_else(|| anyhow!("Notification log not found: {}", notification_id))?;

        log.status = NotificationStatus::Failed;
        log.error_message = Some(error_message.to_string());
        log.retry_count = retry_count;
        Ok(())
    }
}
