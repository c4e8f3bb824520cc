use std::sync::Arc;

use anyhow::{Error, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use push_relay::{
    api::run_api_server,
    clients::{
        circuit_breaker::CircuitBreaker,
        database::PostgresLogStore,
        gateway::{FcmClient, PUSH_GATEWAY_SERVICE},
        rbmq::RabbitMqClient,
        redis::RedisStore,
        status::HttpStatusPublisher,
    },
    config::Config,
    crypto::TokenCipher,
    metrics::Metrics,
    processor::NotificationProcessor,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    let metrics = Arc::new(Metrics::default());

    let api_config = config.clone();
    let api_metrics = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = run_api_server(api_config, api_metrics).await {
            error!(error = %e, "API server exited");
        }
    });

    let redis_store = RedisStore::connect(&config.redis_url).await?;
    let log_store = PostgresLogStore::connect(&config.database_url).await?;
    let cipher = TokenCipher::from_hex_key(&config.encryption_key)?;

    let breaker = CircuitBreaker::new(
        PUSH_GATEWAY_SERVICE.to_string(),
        redis_store,
        config.circuit_breaker_config(),
    );
    let gateway = FcmClient::new(&config)?;
    let status_publisher = HttpStatusPublisher::new(&config.api_gateway_url)?;

    let processor = NotificationProcessor::new(
        gateway,
        log_store,
        breaker,
        status_publisher,
        cipher,
        metrics.clone(),
        config.retry_config(),
    );

    let rbmq = RabbitMqClient::connect(&config).await?;

    info!("Push relay worker started");

    let result = rbmq.run(&processor, &metrics).await;

    rbmq.close().await?;
    result
}
