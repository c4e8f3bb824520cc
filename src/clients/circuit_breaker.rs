use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Error, Result};
use tracing::{debug, info, warn};

use crate::{
    models::circuit_breaker::{CircuitBreakerConfig, CircuitState},
    stores::CircuitBreakerStore,
};

/// Three-state guard in front of a downstream service. Fails fast while the
/// service is degraded instead of piling up latency on every call.
///
/// The open -> half-open transition is lazy: it happens inside `is_open`
/// once the retry timeout has elapsed, never on a background timer.
pub struct CircuitBreaker<S> {
    service_name: String,
    store: S,
    config: CircuitBreakerConfig,
}

impl<S: CircuitBreakerStore> CircuitBreaker<S> {
    pub fn new(service_name: String, store: S, config: CircuitBreakerConfig) -> Self {
        info!(service = %service_name, "Circuit breaker initialized");

        Self {
            service_name,
            store,
            config,
        }
    }

    /// True only while the circuit is open and the retry timeout has not yet
    /// elapsed. Once it has, the state is rewritten to half-open and this
    /// call returns false, letting the next caller probe the service.
    ///
    /// A store read failure is treated as closed, so a flaky state store
    /// never blocks the pipeline.
    pub async fn is_open(&self) -> bool {
        match self.check_open().await {
            Ok(open) => open,
            Err(e) => {
                warn!(
                    service = %self.service_name,
                    error = %e,
                    "Circuit breaker state check failed, treating as closed"
                );
                false
            }
        }
    }

    async fn check_open(&self) -> Result<bool, Error> {
        let state = self.store.state(&self.service_name).await?;

        if state != Some(CircuitState::Open) {
            return Ok(false);
        }

        // `opened_at` can expire or vanish independently of the state key; an
        // open circuit without a timestamp cannot be aged, so let the next
        // caller probe instead of staying dark until the state TTL lapses.
        let timed_out = match self.store.opened_at(&self.service_name).await? {
            Some(opened_at) => {
                unix_now().saturating_sub(opened_at) > self.config.retry_timeout_seconds
            }
            None => true,
        };

        if timed_out {
            self.store
                .set_state(&self.service_name, CircuitState::HalfOpen, None)
                .await?;
            warn!(
                service = %self.service_name,
                "Circuit breaker half-open, allowing trial call"
            );
            return Ok(false);
        }

        Ok(true)
    }

    /// Side-effecting observation: clears the failure counter and closes the
    /// circuit. Never propagates store errors.
    pub async fn record_success(&self) {
        if let Err(e) = self.try_record_success().await {
            warn!(
                service = %self.service_name,
                error = %e,
                "Failed to record circuit breaker success"
            );
        }
    }

    async fn try_record_success(&self) -> Result<(), Error> {
        self.store.clear_failures(&self.service_name).await?;
        self.store
            .set_state(&self.service_name, CircuitState::Closed, None)
            .await?;
        self.store.clear_opened_at(&self.service_name).await?;

        debug!(service = %self.service_name, "Circuit breaker closed");
        Ok(())
    }

    /// Side-effecting observation: increments the failure counter and opens
    /// the circuit at the threshold. Never propagates store errors.
    pub async fn record_failure(&self) {
        if let Err(e) = self.try_record_failure().await {
            warn!(
                service = %self.service_name,
                error = %e,
                "Failed to record circuit breaker failure"
            );
        }
    }

    async fn try_record_failure(&self) -> Result<(), Error> {
        let expiry = Duration::from_secs(self.config.timeout_seconds);
        let failures = self
            .store
            .increment_failures(&self.service_name, expiry)
            .await?;

        debug!(
            service = %self.service_name,
            failures,
            threshold = self.config.failure_threshold,
            "Circuit breaker failure recorded"
        );

        if failures >= self.config.failure_threshold {
            self.store
                .set_state(&self.service_name, CircuitState::Open, Some(expiry))
                .await?;
            self.store
                .set_opened_at(&self.service_name, unix_now())
                .await?;

            warn!(
                service = %self.service_name,
                failures,
                "Circuit breaker opened due to consecutive failures"
            );
        }

        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
