use std::collections::VecDeque;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};

use anyhow::{Error, Result, anyhow};
use push_relay::{
    clients::{
        circuit_breaker::CircuitBreaker,
        gateway::{PUSH_GATEWAY_SERVICE, PushGateway},
        status::StatusPublisher,
    },
    crypto::TokenCipher,
    metrics::Metrics,
    models::{
        circuit_breaker::CircuitBreakerConfig, gateway::GatewayResult,
        message::NotificationRequest, retry::RetryConfig, status::StatusUpdate,
    },
    processor::NotificationProcessor,
    stores::{InMemoryCircuitBreakerStore, InMemoryNotificationLogStore},
};

pub const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub fn test_cipher() -> TokenCipher {
    TokenCipher::from_hex_key(TEST_KEY).unwrap()
}

pub fn service_name() -> String {
    PUSH_GATEWAY_SERVICE.to_string()
}

/// Gateway double that replays a scripted sequence of outcomes, then falls
/// back to a fixed outcome once the script runs out.
#[derive(Clone)]
pub struct ScriptedGateway {
    script: Arc<Mutex<VecDeque<GatewayResult>>>,
    fallback: GatewayResult,
    calls: Arc<AtomicU32>,
}

impl ScriptedGateway {
    pub fn always(result: GatewayResult) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: result,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn sequence(results: Vec<GatewayResult>, fallback: GatewayResult) -> Self {
        Self {
            script: Arc::new(Mutex::new(results.into())),
            fallback,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PushGateway for ScriptedGateway {
    async fn send(&self, _request: &NotificationRequest) -> GatewayResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Status publisher double that records every update it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingStatusPublisher {
    updates: Arc<Mutex<Vec<StatusUpdate>>>,
}

impl RecordingStatusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl StatusPublisher for RecordingStatusPublisher {
    async fn publish(&self, update: &StatusUpdate) -> Result<(), Error> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

/// Status publisher double that always fails, for exercising the best-effort
/// callback contract.
pub struct FailingStatusPublisher;

impl StatusPublisher for FailingStatusPublisher {
    async fn publish(&self, _update: &StatusUpdate) -> Result<(), Error> {
        Err(anyhow!("Status endpoint unreachable"))
    }
}

pub fn retry_config(max_attempts: u32, delay_seconds: u64) -> RetryConfig {
    RetryConfig {
        max_attempts,
        delay_seconds,
    }
}

pub fn breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 5,
        timeout_seconds: 60,
        retry_timeout_seconds: 30,
    }
}

pub fn build_processor<G, P>(
    gateway: G,
    publisher: P,
    log_store: InMemoryNotificationLogStore,
    breaker_store: InMemoryCircuitBreakerStore,
    retry: RetryConfig,
) -> NotificationProcessor<G, InMemoryNotificationLogStore, InMemoryCircuitBreakerStore, P>
where
    G: PushGateway,
    P: StatusPublisher,
{
    let breaker = CircuitBreaker::new(service_name(), breaker_store, breaker_config());

    NotificationProcessor::new(
        gateway,
        log_store,
        breaker,
        publisher,
        test_cipher(),
        Arc::new(Metrics::default()),
        retry,
    )
}

pub fn flat_payload(notification_id: &str) -> Vec<u8> {
    serde_json::json!({
        "notification_id": notification_id,
        "user_id": "u1",
        "push_token": "t1",
        "title": "Hi",
        "body": "there"
    })
    .to_string()
    .into_bytes()
}
