//! Repository methods for the `jobs` table.

use chrono::Utc;
use contact_ingest_protocol::JobStatus;

use crate::error::{DbError, Result};
use crate::models::JobRow;
use crate::ContactDb;

impl ContactDb {
    /// Fetch a job by id.
    pub async fn get_job(&self, job_id: i64) -> Result<JobRow> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(format!("job {job_id}")))
    }

    /// Create a job row for a freshly-uploaded file, in `PENDING` status.
    pub async fn create_job(
        &self,
        user_id: &str,
        original_filename: &str,
        object_key: &str,
    ) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"INSERT INTO jobs (user_id, original_filename, object_key, status)
               VALUES ($1, $2, $3, $4)
               RETURNING job_id"#,
        )
        .bind(user_id)
        .bind(original_filename)
        .bind(object_key)
        .bind(JobStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Transition a job's status. Also stamps `process_start` the first time
    /// a job enters `PROCESSING`, and `process_end` when it reaches a
    /// terminal status (`COMPLETED`, `NEEDS_REVIEW`, `FAILED`).
    ///
    /// Rejects illegal transitions (§9: "reject illegal transitions at the
    /// data-access layer") — e.g. a `COMPLETED` job can never move back to
    /// `PROCESSING`.
    pub async fn set_job_status(&self, job_id: i64, status: JobStatus) -> Result<()> {
        let current = self.get_job(job_id).await?.status()?;
        if !current.can_transition_to(status) {
            return Err(DbError::invalid_input(format!(
                "illegal job status transition for job {job_id}: {current} -> {status}"
            )));
        }

        let now = Utc::now();
        match status {
            JobStatus::Processing => {
                sqlx::query(
                    "UPDATE jobs SET status = $1, process_start = $2 WHERE job_id = $3",
                )
                .bind(status.as_str())
                .bind(now)
                .bind(job_id)
                .execute(&self.pool)
                .await?;
            }
            JobStatus::Completed | JobStatus::NeedsReview | JobStatus::Failed => {
                sqlx::query("UPDATE jobs SET status = $1, process_end = $2 WHERE job_id = $3")
                    .bind(status.as_str())
                    .bind(now)
                    .bind(job_id)
                    .execute(&self.pool)
                    .await?;
            }
            JobStatus::Pending => {
                sqlx::query("UPDATE jobs SET status = $1 WHERE job_id = $2")
                    .bind(status.as_str())
                    .bind(job_id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Record the total row count parsed from the CSV, once known.
    pub async fn set_job_total_rows(&self, job_id: i64, total_rows: i32) -> Result<()> {
        sqlx::query("UPDATE jobs SET total_rows = $1 WHERE job_id = $2")
            .bind(total_rows)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Advance the `processed_rows` checkpoint. Called every
    /// `progress_update_interval` rows so a crash mid-file doesn't lose all
    /// progress visibility.
    pub async fn set_job_processed_rows(&self, job_id: i64, processed_rows: i32) -> Result<()> {
        sqlx::query("UPDATE jobs SET processed_rows = $1 WHERE job_id = $2")
            .bind(processed_rows)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Recompute and store `issue_count` as the number of unresolved issues
    /// for this job.
    pub async fn refresh_job_issue_count(&self, job_id: i64) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM issues WHERE job_id = $1 AND resolved = false",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        sqlx::query("UPDATE jobs SET issue_count = $1 WHERE job_id = $2")
            .bind(row.0 as i32)
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(row.0)
    }
}
