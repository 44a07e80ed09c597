//! Repository methods for `issues` and `issue_items`.
//!
//! An issue is keyed by `(job_id, issue_type, issue_key)` (invariant I4): a
//! duplicate-email issue for `a@example.com` within one job is a single
//! row that accumulates staging rows as `issue_items`, not one row per
//! offending staging entry.

use contact_ingest_protocol::IssueType;

use crate::error::{DbError, Result};
use crate::models::IssueRow;
use crate::ContactDb;

impl ContactDb {
    /// Find or create the issue row for `(job_id, issue_type, issue_key)`,
    /// returning its id. Does not touch `resolved` on an existing row —
    /// the reprocess flow decides separately whether a resolved issue
    /// should reopen (see `issue_unresolve`).
    ///
    /// Relies on the `(job_id, issue_type, issue_key)` unique constraint to
    /// collapse concurrent upserts rather than a select-then-insert race
    /// (§9: "rely on the database to collapse races").
    pub async fn issue_get_or_create(
        &self,
        job_id: i64,
        issue_type: IssueType,
        issue_key: &str,
        description: &str,
    ) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"INSERT INTO issues (job_id, issue_type, issue_key, description)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (job_id, issue_type, issue_key)
               DO UPDATE SET issue_id = issues.issue_id
               RETURNING issue_id"#,
        )
        .bind(job_id)
        .bind(issue_type.as_str())
        .bind(issue_key)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Attach a staging row to an issue as an affected item. Idempotent:
    /// linking the same pair twice is a no-op.
    pub async fn issue_link_staging(&self, issue_id: i64, staging_id: i64) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO issue_items (issue_id, staging_id)
               VALUES ($1, $2)
               ON CONFLICT (issue_id, staging_id) DO NOTHING"#,
        )
        .bind(issue_id)
        .bind(staging_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch an issue by id.
    pub async fn issue_get(&self, issue_id: i64) -> Result<IssueRow> {
        sqlx::query_as::<_, IssueRow>("SELECT * FROM issues WHERE issue_id = $1")
            .bind(issue_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found(format!("issue {issue_id}")))
    }

    /// All issues raised against a job.
    pub async fn issue_list_for_job(&self, job_id: i64) -> Result<Vec<IssueRow>> {
        let rows = sqlx::query_as::<_, IssueRow>(
            "SELECT * FROM issues WHERE job_id = $1 ORDER BY issue_id ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Staging ids currently attached to an issue.
    pub async fn issue_item_staging_ids(&self, issue_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT staging_id FROM issue_items WHERE issue_id = $1 ORDER BY staging_id ASC",
        )
        .bind(issue_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Mark an issue resolved. `resolved_by` identifies the operator or
    /// system actor that resolved it; `comment` records why.
    pub async fn issue_resolve(
        &self,
        issue_id: i64,
        resolved_by: &str,
        comment: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE issues SET
                   resolved = true,
                   resolved_at = now(),
                   resolved_by = $1,
                   resolution_comment = $2
               WHERE issue_id = $3"#,
        )
        .bind(resolved_by)
        .bind(comment)
        .bind(issue_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Issue ids currently linked to a staging row, via `issue_items`.
    pub async fn issue_ids_for_staging(&self, staging_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query_as::<_, (i64,)>(
            "SELECT issue_id FROM issue_items WHERE staging_id = $1 ORDER BY issue_id ASC",
        )
        .bind(staging_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Reopen a previously resolved issue: clear `resolved`,
    /// `resolved_at`, `resolved_by`, and `resolution_comment`.
    pub async fn issue_unresolve(&self, issue_id: i64) -> Result<()> {
        sqlx::query(
            r#"UPDATE issues SET
                   resolved = false,
                   resolved_at = NULL,
                   resolved_by = NULL,
                   resolution_comment = NULL
               WHERE issue_id = $1"#,
        )
        .bind(issue_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// True if every issue raised against a job has been resolved. A job
    /// with no issues at all counts as fully resolved.
    pub async fn job_has_unresolved_issues(&self, job_id: i64) -> Result<bool> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM issues WHERE job_id = $1 AND resolved = false",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }
}
