use tokio::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_seconds: u64,
}

impl RetryConfig {
    /// Exponential backoff: `delay_seconds * 2^(attempt - 1)` for the 1-based
    /// attempt counter, so a base of 5s yields 5s, 10s, 20s, ...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_secs(self.delay_seconds.saturating_mul(factor))
    }
}
