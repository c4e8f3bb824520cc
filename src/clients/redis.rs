use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::info;

use crate::{
    models::circuit_breaker::CircuitState,
    stores::CircuitBreakerStore,
};

/// Redis-backed circuit-breaker store shared across consumer processes.
/// Failure counting relies on Redis `INCR` + `EXPIRE` staying atomic per key.
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, Error> {
        let client =
            Client::open(redis_url).map_err(|_| anyhow!("Failed to create redis client"))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|_| anyhow!("Failed to connect to redis"))?;

        info!("Redis connection established");

        Ok(Self { connection })
    }

    pub async fn ping(&self) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        conn.ping::<String>()
            .await
            .map_err(|e| anyhow!("Redis ping failed: {}", e))?;
        Ok(())
    }

    fn state_key(service: &str) -> String {
        format!("circuit_breaker:{}:state", service)
    }

    fn failures_key(service: &str) -> String {
        format!("circuit_breaker:{}:failures", service)
    }

    fn opened_at_key(service: &str) -> String {
        format!("circuit_breaker:{}:opened_at", service)
    }
}

impl CircuitBreakerStore for RedisStore {
    async fn state(&self, service: &str) -> Result<Option<CircuitState>, Error> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(Self::state_key(service)).await?;

        Ok(value.map(|s| CircuitState::from_string(&s)))
    }

    async fn set_state(
        &self,
        service: &str,
        state: CircuitState,
        ttl: Option<Duration>,
    ) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        let key = Self::state_key(service);

        match ttl {
            Some(ttl) => {
                conn.set_ex::<_, _, ()>(&key, state.as_str(), ttl.as_secs())
                    .await?
            }
            None => conn.set::<_, _, ()>(&key, state.as_str()).await?,
        }

        Ok(())
    }

    async fn increment_failures(&self, service: &str, expiry: Duration) -> Result<u32, Error> {
        let mut conn = self.connection.clone();
        let key = Self::failures_key(service);

        let count: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, expiry.as_secs() as i64).await?;

        Ok(count)
    }

    async fn clear_failures(&self, service: &str) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(Self::failures_key(service)).await?;
        Ok(())
    }

    async fn opened_at(&self, service: &str) -> Result<Option<u64>, Error> {
        let mut conn = self.connection.clone();
        let value: Option<u64> = conn.get(Self::opened_at_key(service)).await?;
        Ok(value)
    }

    async fn set_opened_at(&self, service: &str, unix_seconds: u64) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(Self::opened_at_key(service), unix_seconds)
            .await?;
        Ok(())
    }

    async fn clear_opened_at(&self, service: &str) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(Self::opened_at_key(service)).await?;
        Ok(())
    }
}
