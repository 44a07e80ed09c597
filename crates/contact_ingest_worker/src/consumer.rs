//! The queue consumer: a long-running receive loop that dispatches each
//! message to the job processor and decides ack/retry/delete (§4.6, §7).

use std::time::Duration;

use contact_ingest_db::ContactDb;
use contact_ingest_protocol::JobMessage;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::blob::BlobStore;
use crate::error::ProcessError;
use crate::processor::JobProcessor;
use crate::queue::MessageQueue;

/// Consumer configuration, plain data mirroring the settings table.
pub struct ConsumerConfig {
    pub max_number_of_messages: i32,
    pub wait_time_seconds: i32,
    pub retry_delay_seconds: u64,
    pub progress_update_interval: u32,
}

/// Drives the receive loop. Holds the two collaborators (blob, queue)
/// explicitly rather than as global singletons, per the design note in §9.
pub struct Consumer<'a, Q: MessageQueue, B: BlobStore> {
    queue: &'a Q,
    db: &'a ContactDb,
    blob: &'a B,
    config: ConsumerConfig,
}

#[derive(Deserialize)]
struct RawMessage {
    job_id: Option<i64>,
    s3_key: Option<String>,
}

impl<'a, Q: MessageQueue, B: BlobStore> Consumer<'a, Q, B> {
    pub fn new(queue: &'a Q, db: &'a ContactDb, blob: &'a B, config: ConsumerConfig) -> Self {
        Self {
            queue,
            db,
            blob,
            config,
        }
    }

    /// Run until `shutdown` fires. Used by both the CLI entry point (wired
    /// to SIGINT/SIGTERM) and tests (wired to a cooperative flag).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("queue consumer starting");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                received = self.queue.receive(
                    self.config.max_number_of_messages,
                    self.config.wait_time_seconds,
                ) => {
                    match received {
                        Ok(messages) => {
                            for message in messages {
                                self.handle_one(&message.body, &message.receipt_handle).await;
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "transient queue error, backing off");
                            tokio::time::sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
                        }
                    }
                }
            }
        }

        info!("queue consumer stopped");
    }

    async fn handle_one(&self, body: &str, receipt_handle: &str) {
        let parsed: RawMessage = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(error = %err, "poison message: malformed body, deleting");
                self.delete(receipt_handle).await;
                return;
            }
        };

        let message = match (parsed.job_id, parsed.s3_key) {
            (Some(job_id), Some(s3_key)) => JobMessage { job_id, s3_key },
            _ => {
                warn!("poison message: missing job_id or s3_key, deleting");
                self.delete(receipt_handle).await;
                return;
            }
        };

        let processor = JobProcessor::new(self.db, self.blob, self.config.progress_update_interval);

        match processor.process_job(message.job_id, &message.s3_key).await {
            Ok(()) => {
                info!(job_id = message.job_id, "job processed, deleting message");
                self.delete(receipt_handle).await;
            }
            Err(ProcessError::Stale { job_id, reason }) => {
                info!(job_id, reason, "stale message, deleting");
                self.delete(receipt_handle).await;
            }
            Err(ProcessError::JobFatal { job_id, source }) => {
                error!(job_id, error = %source, "job failed, leaving message for redelivery");
            }
            Err(ProcessError::Transient(err)) => {
                warn!(error = %err, "transient error processing message, leaving for redelivery");
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) {
        if let Err(err) = self.queue.delete(receipt_handle).await {
            warn!(error = %err, "failed to delete message after handling");
        }
    }
}
