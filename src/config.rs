use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::{circuit_breaker::CircuitBreakerConfig, retry::RetryConfig};

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    pub push_exchange_name: String,
    pub push_queue_name: String,
    pub failed_queue_name: String,

    pub redis_url: String,

    pub database_url: String,

    pub fcm_project_id: String,

    pub api_gateway_url: String,

    /// 64 hex characters (32 bytes) for AES-256-GCM.
    pub encryption_key: String,

    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_timeout_seconds: u64,
    pub circuit_breaker_retry_timeout_seconds: u64,

    pub max_retry_attempts: u32,
    pub retry_delay_seconds: u64,

    pub server_port: u16,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|_| anyhow!("Invalid or missing environmental variable"))?;
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            delay_seconds: self.retry_delay_seconds,
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            timeout_seconds: self.circuit_breaker_timeout_seconds,
            retry_timeout_seconds: self.circuit_breaker_retry_timeout_seconds,
        }
    }
}
