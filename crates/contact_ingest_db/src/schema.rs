//! Table creation for the five entities of the data model.
//!
//! All `CREATE TABLE` statements live here - single source of truth, run
//! idempotently once at pool construction.

use tracing::info;

use crate::error::Result;
use crate::ContactDb;

impl ContactDb {
    /// Ensure all tables and constraints exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS jobs (
                job_id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                original_filename TEXT NOT NULL,
                object_key TEXT NOT NULL,
                status TEXT NOT NULL,
                total_rows INTEGER NOT NULL DEFAULT 0,
                processed_rows INTEGER NOT NULL DEFAULT 0,
                issue_count INTEGER NOT NULL DEFAULT 0,
                process_start TIMESTAMPTZ,
                process_end TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_user_id ON jobs(user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS staging (
                staging_id BIGSERIAL PRIMARY KEY,
                job_id BIGINT NOT NULL REFERENCES jobs(job_id) ON DELETE CASCADE,
                email TEXT,
                first_name TEXT,
                last_name TEXT,
                company TEXT,
                status TEXT,
                row_hash TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (job_id, row_hash)
            )"#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_staging_job_id ON staging(job_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_staging_status ON staging(job_id, status)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS issues (
                issue_id BIGSERIAL PRIMARY KEY,
                job_id BIGINT NOT NULL REFERENCES jobs(job_id) ON DELETE CASCADE,
                issue_type TEXT NOT NULL,
                issue_key TEXT NOT NULL,
                resolved BOOLEAN NOT NULL DEFAULT false,
                description TEXT,
                resolved_at TIMESTAMPTZ,
                resolved_by TEXT,
                resolution_comment TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (job_id, issue_type, issue_key)
            )"#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_issues_job_id ON issues(job_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS issue_items (
                issue_item_id BIGSERIAL PRIMARY KEY,
                issue_id BIGINT NOT NULL REFERENCES issues(issue_id) ON DELETE CASCADE,
                staging_id BIGINT NOT NULL REFERENCES staging(staging_id) ON DELETE CASCADE,
                UNIQUE (issue_id, staging_id)
            )"#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_issue_items_staging_id ON issue_items(staging_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS contacts (
                contact_id BIGSERIAL PRIMARY KEY,
                staging_id BIGINT NOT NULL UNIQUE REFERENCES staging(staging_id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                email TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                company TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_contacts_user_email ON contacts(user_id, email)")
            .execute(&self.pool)
            .await?;

        info!("contact ingest schema verified");
        Ok(())
    }
}
