//! Message queue client seam (§4.7): receive/delete behind a trait, so the
//! consumer loop can be driven in-process by tests without a live queue.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use aws_sdk_sqs::Client as SqsClient;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// One message received from the queue.
#[derive(Debug, Clone)]
pub struct Message {
    pub body: String,
    pub receipt_handle: String,
}

/// Receive/delete access to the work queue.
pub trait MessageQueue: Send + Sync {
    fn receive(
        &self,
        max_messages: i32,
        wait_seconds: i32,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, QueueError>> + Send;

    fn delete(
        &self,
        receipt_handle: &str,
    ) -> impl std::future::Future<Output = Result<(), QueueError>> + Send;
}

/// Production queue client, backed by an SQS-compatible queue.
pub struct SqsMessageQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsMessageQueue {
    pub fn new(client: SqsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

impl MessageQueue for SqsMessageQueue {
    async fn receive(&self, max_messages: i32, wait_seconds: i32) -> Result<Vec<Message>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|err| QueueError::Backend(anyhow::anyhow!(err)))?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                Some(Message {
                    body: m.body?,
                    receipt_handle: m.receipt_handle?,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|err| QueueError::Backend(anyhow::anyhow!(err)))?;
        Ok(())
    }
}

struct InFlightMessage {
    message: Message,
    visible_again_at: Instant,
}

/// In-memory queue for tests, backed by a `VecDeque`. Models the
/// visibility-timeout redelivery behavior the idempotency property tests
/// (P1) depend on: a received-but-undeleted message becomes receivable
/// again once its visibility window elapses.
pub struct InMemoryMessageQueue {
    state: Mutex<QueueState>,
}

struct QueueState {
    ready: VecDeque<Message>,
    in_flight: Vec<InFlightMessage>,
    visibility_timeout: Duration,
    next_receipt: u64,
}

impl InMemoryMessageQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState {
                ready: VecDeque::new(),
                in_flight: Vec::new(),
                visibility_timeout,
                next_receipt: 0,
            }),
        }
    }

    /// Enqueue a raw message body (e.g. a serialized `JobMessage`).
    pub fn push(&self, body: impl Into<String>) {
        let mut state = self.state.lock().expect("in-memory queue mutex poisoned");
        let receipt = state.next_receipt;
        state.next_receipt += 1;
        state.ready.push_back(Message {
            body: body.into(),
            receipt_handle: receipt.to_string(),
        });
    }

    fn requeue_expired(state: &mut QueueState) {
        let now = Instant::now();
        let mut still_in_flight = Vec::new();
        for entry in state.in_flight.drain(..) {
            if entry.visible_again_at <= now {
                state.ready.push_back(entry.message);
            } else {
                still_in_flight.push(entry);
            }
        }
        state.in_flight = still_in_flight;
    }
}

impl MessageQueue for InMemoryMessageQueue {
    async fn receive(&self, max_messages: i32, _wait_seconds: i32) -> Result<Vec<Message>, QueueError> {
        let mut state = self.state.lock().expect("in-memory queue mutex poisoned");
        Self::requeue_expired(&mut state);

        let mut received = Vec::new();
        let visibility_timeout = state.visibility_timeout;
        for _ in 0..max_messages.max(0) {
            let Some(message) = state.ready.pop_front() else {
                break;
            };
            state.in_flight.push(InFlightMessage {
                message: message.clone(),
                visible_again_at: Instant::now() + visibility_timeout,
            });
            received.push(message);
        }
        Ok(received)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().expect("in-memory queue mutex poisoned");
        state
            .in_flight
            .retain(|entry| entry.message.receipt_handle != receipt_handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receives_in_fifo_order() {
        let queue = InMemoryMessageQueue::new(Duration::from_secs(300));
        queue.push("first");
        queue.push("second");

        let received = queue.receive(10, 0).await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].body, "first");
        assert_eq!(received[1].body, "second");
    }

    #[tokio::test]
    async fn deleted_message_is_not_redelivered() {
        let queue = InMemoryMessageQueue::new(Duration::from_millis(10));
        queue.push("msg");
        let received = queue.receive(1, 0).await.unwrap();
        queue.delete(&received[0].receipt_handle).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        let redelivered = queue.receive(1, 0).await.unwrap();
        assert!(redelivered.is_empty());
    }

    #[tokio::test]
    async fn undeleted_message_is_redelivered_after_visibility_timeout() {
        let queue = InMemoryMessageQueue::new(Duration::from_millis(10));
        queue.push("msg");
        let first = queue.receive(1, 0).await.unwrap();
        assert_eq!(first.len(), 1);

        // still invisible immediately after receipt
        let immediate = queue.receive(1, 0).await.unwrap();
        assert!(immediate.is_empty());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let redelivered = queue.receive(1, 0).await.unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].body, "msg");
    }
}
