use std::sync::Mutex;

use anyhow::{Error, Result};
use lapin::types::{AMQPValue, ShortString};
use push_relay::{
    clients::rbmq::{DeliverySink, dlq_headers, settle_delivery},
    processor::ProcessOutcome,
};

#[derive(Debug, Clone, PartialEq)]
enum BrokerAction {
    Ack(u64),
    Reject { delivery_tag: u64, requeue: bool },
    DeadLetter(Vec<u8>),
}

/// Sink double that records the broker actions a settled delivery produces.
#[derive(Default)]
struct RecordingSink {
    actions: Mutex<Vec<BrokerAction>>,
}

impl RecordingSink {
    fn actions(&self) -> Vec<BrokerAction> {
        self.actions.lock().unwrap().clone()
    }
}

impl DeliverySink for RecordingSink {
    async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.actions
            .lock()
            .unwrap()
            .push(BrokerAction::Ack(delivery_tag));
        Ok(())
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.actions.lock().unwrap().push(BrokerAction::Reject {
            delivery_tag,
            requeue,
        });
        Ok(())
    }

    async fn publish_to_dlq(&self, body: &[u8]) -> Result<(), Error> {
        self.actions
            .lock()
            .unwrap()
            .push(BrokerAction::DeadLetter(body.to_vec()));
        Ok(())
    }
}

/// Test: A successful outcome acknowledges the delivery and nothing else
#[tokio::test]
async fn test_success_is_acknowledged() -> Result<()> {
    let sink = RecordingSink::default();

    settle_delivery(&sink, 7, b"{}", &ProcessOutcome::Success).await?;

    assert_eq!(sink.actions(), vec![BrokerAction::Ack(7)]);

    Ok(())
}

/// Test: A retryable failure is rejected back to the queue with requeue set
#[tokio::test]
async fn test_retryable_failure_is_requeued() -> Result<()> {
    let sink = RecordingSink::default();

    settle_delivery(
        &sink,
        7,
        b"{}",
        &ProcessOutcome::RetryableFailure("broker hiccup".to_string()),
    )
    .await?;

    assert_eq!(
        sink.actions(),
        vec![BrokerAction::Reject {
            delivery_tag: 7,
            requeue: true
        }]
    );

    Ok(())
}

/// Test: A permanent failure dead-letters the unchanged body, then acks the
/// original so it never redelivers
#[tokio::test]
async fn test_permanent_failure_is_dead_lettered_then_acked() -> Result<()> {
    let sink = RecordingSink::default();
    let body = br#"{"notification_id":"n1"}"#;

    settle_delivery(
        &sink,
        7,
        body,
        &ProcessOutcome::PermanentFailure("Max retries exceeded".to_string()),
    )
    .await?;

    assert_eq!(
        sink.actions(),
        vec![
            BrokerAction::DeadLetter(body.to_vec()),
            BrokerAction::Ack(7)
        ],
        "Dead-letter publish must precede the ack"
    );

    Ok(())
}

/// Test: Dead-letter headers carry the failure time and the originating queue
#[test]
fn test_dlq_headers_content() {
    let before = chrono::Utc::now().timestamp();
    let headers = dlq_headers("push_notifications");
    let after = chrono::Utc::now().timestamp();
    let inner = headers.inner();

    match inner.get(&ShortString::from("x-failed-at")) {
        Some(AMQPValue::LongLongInt(ts)) => {
            assert!(
                *ts >= before && *ts <= after,
                "x-failed-at should be the current unix time, got {}",
                ts
            );
        }
        other => panic!("x-failed-at missing or wrong type: {:?}", other),
    }

    match inner.get(&ShortString::from("x-original-queue")) {
        Some(AMQPValue::LongString(queue)) => {
            assert_eq!(queue.to_string(), "push_notifications");
        }
        other => panic!("x-original-queue missing or wrong type: {:?}", other),
    }
}
