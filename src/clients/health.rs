use std::{collections::HashMap, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{
        database::PostgresLogStore,
        gateway::PUSH_GATEWAY_SERVICE,
        rbmq::RabbitMqClient,
        redis::RedisStore,
    },
    config::Config,
    models::{
        circuit_breaker::CircuitState,
        health::{HealthCheckResponse, HealthStatus, ServiceHealth},
    },
    stores::CircuitBreakerStore,
};

/// Probes every backing service from scratch on each request. Connections
/// are not pooled here so a check reflects what a fresh worker would see.
pub struct HealthChecker {
    config: Config,
}

impl HealthChecker {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let db_health = self.check_database().await;
        checks.insert("database".to_string(), db_health);

        let redis_health = self.check_redis().await;
        checks.insert("cache_service".to_string(), redis_health);

        let rabbitmq_health = self.check_rabbitmq().await;
        checks.insert("message_broker".to_string(), rabbitmq_health);

        let gateway_health = self.check_circuit_breaker(PUSH_GATEWAY_SERVICE).await;
        checks.insert(PUSH_GATEWAY_SERVICE.to_string(), gateway_health);

        let overall_status = determine_overall_status(&checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            checks,
        }
    }

    async fn check_database(&self) -> ServiceHealth {
        let start = Instant::now();

        match PostgresLogStore::connect(&self.config.database_url).await {
            Ok(store) => match store.health_check().await {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(response_time_ms = elapsed, "Database health check passed");
                    ServiceHealth::healthy(elapsed)
                }
                Err(e) => {
                    warn!(error = %e, "Database health check failed");
                    ServiceHealth::unhealthy(format!("Health check query failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Database connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_redis(&self) -> ServiceHealth {
        let start = Instant::now();

        match RedisStore::connect(&self.config.redis_url).await {
            Ok(store) => match store.ping().await {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(response_time_ms = elapsed, "Redis health check passed");
                    ServiceHealth::healthy(elapsed)
                }
                Err(e) => {
                    warn!(error = %e, "Redis ping failed");
                    ServiceHealth::unhealthy(format!("Ping failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Redis connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_rabbitmq(&self) -> ServiceHealth {
        let start = Instant::now();

        match RabbitMqClient::connect(&self.config).await {
            Ok(client) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");

                if let Err(e) = client.close().await {
                    warn!(error = %e, "RabbitMQ health check connection close failed");
                }

                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    /// An open or half-open breaker degrades the service but does not fail
    /// the check; the worker is still able to drain retries and dead-letter.
    async fn check_circuit_breaker(&self, service_name: &str) -> ServiceHealth {
        let state = match RedisStore::connect(&self.config.redis_url).await {
            Ok(store) => store.state(service_name).await,
            Err(e) => Err(e),
        };

        match state {
            Ok(state) => {
                let state = state.unwrap_or(CircuitState::Closed);
                let state_str = state.as_str().to_string();
                debug!(
                    service = service_name,
                    circuit_state = %state_str,
                    "Circuit breaker state checked"
                );

                match state {
                    CircuitState::Closed => {
                        ServiceHealth::healthy(0).with_circuit_state(state_str)
                    }
                    CircuitState::HalfOpen => ServiceHealth::degraded(
                        state_str,
                        Some("Circuit breaker in recovery mode".to_string()),
                    ),
                    CircuitState::Open => ServiceHealth::degraded(
                        state_str,
                        Some("Circuit breaker is open".to_string()),
                    ),
                }
            }
            Err(e) => {
                warn!(
                    service = service_name,
                    error = %e,
                    "Failed to check circuit breaker state"
                );
                ServiceHealth::unhealthy(format!("Cannot check circuit breaker: {}", e))
            }
        }
    }
}

fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
    let has_unhealthy = checks
        .values()
        .any(|health| health.status == HealthStatus::Unhealthy);

    let has_degraded = checks
        .values()
        .any(|health| health.status == HealthStatus::Degraded);

    if has_unhealthy {
        HealthStatus::Unhealthy
    } else if has_degraded {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
