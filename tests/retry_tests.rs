use std::time::Duration;

use push_relay::models::retry::RetryConfig;

/// Test: Backoff delays double with each attempt
#[test]
fn test_backoff_doubles_per_attempt() {
    let config = RetryConfig {
        max_attempts: 3,
        delay_seconds: 5,
    };

    assert_eq!(config.backoff_delay(1), Duration::from_secs(5));
    assert_eq!(config.backoff_delay(2), Duration::from_secs(10));
    assert_eq!(config.backoff_delay(3), Duration::from_secs(20));
}

/// Test: A zero base delay yields zero backoff at every attempt
#[test]
fn test_zero_base_delay() {
    let config = RetryConfig {
        max_attempts: 3,
        delay_seconds: 0,
    };

    assert_eq!(config.backoff_delay(1), Duration::ZERO);
    assert_eq!(config.backoff_delay(5), Duration::ZERO);
}

/// Test: Large attempt numbers saturate instead of overflowing
#[test]
fn test_backoff_saturates() {
    let config = RetryConfig {
        max_attempts: 100,
        delay_seconds: 10,
    };

    let delay = config.backoff_delay(80);
    assert!(delay >= config.backoff_delay(64));
}
