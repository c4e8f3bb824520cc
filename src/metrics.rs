use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

/// Process-local delivery metrics, rendered as Prometheus-style text by the
/// `/metrics` endpoint. Every increment is also traced so the numbers stay
/// visible in log aggregation.
#[derive(Debug, Default)]
pub struct Metrics {
    messages_consumed: AtomicU64,
    sent_success: AtomicU64,
    sent_failed: AtomicU64,
    sent_error: AtomicU64,
    retries: AtomicU64,
    duration_micros_sum: AtomicU64,
    duration_count: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_consumed(&self) {
        let total = self.messages_consumed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(total, "Message consumed from queue");
    }

    pub fn record_success(&self) {
        let total = self.sent_success.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(total, status = "success", "Notification outcome recorded");
    }

    pub fn record_failure(&self) {
        let total = self.sent_failed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(total, status = "failed", "Notification outcome recorded");
    }

    pub fn record_error(&self) {
        let total = self.sent_error.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(total, status = "error", "Notification outcome recorded");
    }

    pub fn record_retry(&self) {
        let total = self.retries.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(total, "Notification retry recorded");
    }

    pub fn record_duration(&self, duration: Duration) {
        self.duration_micros_sum
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.duration_count.fetch_add(1, Ordering::Relaxed);
        debug!(
            duration_ms = duration.as_millis() as u64,
            "Notification processing duration recorded"
        );
    }

    pub fn render(&self) -> String {
        let duration_seconds =
            self.duration_micros_sum.load(Ordering::Relaxed) as f64 / 1_000_000.0;

        format!(
            concat!(
                "# TYPE messages_consumed_total counter\n",
                "messages_consumed_total {}\n",
                "# TYPE notifications_sent_total counter\n",
                "notifications_sent_total{{status=\"success\"}} {}\n",
                "notifications_sent_total{{status=\"failed\"}} {}\n",
                "notifications_sent_total{{status=\"error\"}} {}\n",
                "# TYPE notification_retries_total counter\n",
                "notification_retries_total {}\n",
                "# TYPE notification_duration_seconds summary\n",
                "notification_duration_seconds_sum {}\n",
                "notification_duration_seconds_count {}\n",
            ),
            self.messages_consumed.load(Ordering::Relaxed),
            self.sent_success.load(Ordering::Relaxed),
            self.sent_failed.load(Ordering::Relaxed),
            self.sent_error.load(Ordering::Relaxed),
            self.retries.load(Ordering::Relaxed),
            duration_seconds,
            self.duration_count.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_recorded_counters() {
        let metrics = Metrics::new();

        metrics.record_consumed();
        metrics.record_consumed();
        metrics.record_success();
        metrics.record_retry();
        metrics.record_duration(Duration::from_millis(250));

        let rendered = metrics.render();
        assert!(rendered.contains("messages_consumed_total 2"));
        assert!(rendered.contains("notifications_sent_total{status=\"success\"} 1"));
        assert!(rendered.contains("notifications_sent_total{status=\"failed\"} 0"));
        assert!(rendered.contains("notification_retries_total 1"));
        assert!(rendered.contains("notification_duration_seconds_count 1"));
    }
}
