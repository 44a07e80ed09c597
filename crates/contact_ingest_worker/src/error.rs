//! The processor-boundary error taxonomy (§7): a single enum so the
//! consumer can decide ack/retry/delete without string-matching messages
//! from the data access layer, blob client, or queue client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessError>;

/// How a failure at the processor boundary should be handled by the
/// queue consumer.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The job row was missing, or already `COMPLETED` — redelivery of a
    /// message that no longer needs action. Delete and move on.
    #[error("stale message for job {job_id}: {reason}")]
    Stale { job_id: i64, reason: &'static str },

    /// The CSV was empty, the blob was missing, or some other
    /// unrecoverable condition struck mid-job. The job is transitioned to
    /// `FAILED`; the message is left for redelivery.
    #[error("job {job_id} failed: {source}")]
    JobFatal {
        job_id: i64,
        #[source]
        source: anyhow::Error,
    },

    /// A queue, blob, or database connectivity problem that is expected
    /// to clear on its own. Not job-specific; the consumer sleeps and
    /// retries the poll loop.
    #[error("transient infrastructure error: {0}")]
    Transient(#[source] anyhow::Error),
}

impl ProcessError {
    pub fn stale(job_id: i64, reason: &'static str) -> Self {
        Self::Stale { job_id, reason }
    }

    pub fn job_fatal(job_id: i64, source: impl Into<anyhow::Error>) -> Self {
        Self::JobFatal {
            job_id,
            source: source.into(),
        }
    }

    pub fn transient(source: impl Into<anyhow::Error>) -> Self {
        Self::Transient(source.into())
    }
}

impl From<contact_ingest_db::DbError> for ProcessError {
    fn from(err: contact_ingest_db::DbError) -> Self {
        ProcessError::transient(err)
    }
}
