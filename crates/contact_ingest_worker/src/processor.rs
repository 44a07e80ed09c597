//! The job processor: the state machine that orchestrates the initial and
//! reprocessing flows and the consolidation step (§4.4).

use std::collections::{HashMap, HashSet};

use contact_ingest_db::{ContactDb, DbError, StagingRow};
use contact_ingest_protocol::{defaults, FieldRow, JobStatus, StagingStatus};
use tracing::{info, warn};

use crate::blob::{BlobError, BlobStore};
use crate::csv_decoder;
use crate::error::{ProcessError, Result};
use crate::validator::{self, ValidationOutcome};

/// Drives one job to completion or to a halt for human review.
pub struct JobProcessor<'a, B: BlobStore> {
    db: &'a ContactDb,
    blob: &'a B,
    progress_update_interval: u32,
}

impl<'a, B: BlobStore> JobProcessor<'a, B> {
    pub fn new(db: &'a ContactDb, blob: &'a B, progress_update_interval: u32) -> Self {
        Self {
            db,
            blob,
            progress_update_interval,
        }
    }

    /// Entry point: `process_job(job_id, object_key)`.
    pub async fn process_job(&self, job_id: i64, object_key: &str) -> Result<()> {
        let job = match self.db.get_job(job_id).await {
            Ok(job) => job,
            Err(DbError::NotFound(_)) => {
                info!(job_id, "job not found, treating message as stale");
                return Err(ProcessError::stale(job_id, "job not found"));
            }
            Err(err) => return Err(ProcessError::transient(err)),
        };

        let status = job.status().map_err(|e| ProcessError::job_fatal(job_id, e))?;
        if status == JobStatus::Completed {
            info!(job_id, "job already completed, treating message as stale");
            return Err(ProcessError::stale(job_id, "job already completed"));
        }

        let has_staging = self
            .db
            .staging_list_for_job(job_id)
            .await
            .map(|rows| !rows.is_empty())
            .map_err(ProcessError::from)?;

        let result = if has_staging {
            self.reprocess_flow(job_id, &job.user_id).await
        } else {
            self.initial_flow(job_id, &job.user_id, object_key).await
        };

        if let Err(err) = &result {
            if matches!(err, ProcessError::JobFatal { .. }) {
                let _ = self.db.set_job_status(job_id, JobStatus::Failed).await;
            }
        }

        result
    }

    async fn initial_flow(&self, job_id: i64, user_id: &str, object_key: &str) -> Result<()> {
        self.db
            .set_job_status(job_id, JobStatus::Processing)
            .await
            .map_err(ProcessError::from)?;

        let bytes = self.blob.fetch(object_key).await.map_err(|err| match err {
            BlobError::NotFound(key) => {
                ProcessError::job_fatal(job_id, anyhow::anyhow!("object '{key}' not found"))
            }
            BlobError::Backend(e) => ProcessError::transient(e),
        })?;

        let decoded = csv_decoder::decode(&bytes)
            .map_err(|e| ProcessError::job_fatal(job_id, anyhow::anyhow!(e)))?;

        if decoded.rows.is_empty() {
            return Err(ProcessError::job_fatal(job_id, anyhow::anyhow!("CSV decoded to zero rows")));
        }

        info!(
            job_id,
            encoding = decoded.encoding_used,
            delimiter = %decoded.delimiter_used,
            row_count = decoded.rows.len(),
            "decoded csv"
        );

        let duplicate_emails = duplicate_emails_in_batch(&decoded.rows);
        let all_emails = all_non_empty_emails(&decoded.rows);
        let existing_emails: HashSet<String> = self
            .db
            .contacts_existing_emails(user_id)
            .await
            .map_err(ProcessError::from)?
            .into_iter()
            .filter(|e| all_emails.contains(e))
            .collect();

        let mut processed: u32 = 0;
        let mut last_checkpoint: u32 = 0;

        for (idx, row) in decoded.rows.iter().enumerate() {
            let row_number = (idx + 1) as i64;
            let hash = contact_ingest_db::row_hash(job_id, row_number, row);

            if self
                .db
                .staging_find_by_hash(job_id, &hash)
                .await
                .map_err(ProcessError::from)?
                .is_some()
            {
                continue;
            }

            if let Err(err) = self
                .stage_and_validate_row(job_id, row, &hash, &duplicate_emails, &existing_emails, row_number)
                .await
            {
                warn!(job_id, row_number, error = %err, "row-local failure, skipping row");
                continue;
            }

            processed += 1;
            if processed - last_checkpoint >= self.progress_update_interval {
                self.db
                    .set_job_processed_rows(job_id, processed as i32)
                    .await
                    .map_err(ProcessError::from)?;
                last_checkpoint = processed;
            }
        }

        self.db
            .set_job_total_rows(job_id, decoded.rows.len() as i32)
            .await
            .map_err(ProcessError::from)?;
        self.db
            .set_job_processed_rows(job_id, processed as i32)
            .await
            .map_err(ProcessError::from)?;
        let issues_created = self
            .db
            .refresh_job_issue_count(job_id)
            .await
            .map_err(ProcessError::from)?;

        if issues_created > 0 {
            self.db
                .set_job_status(job_id, JobStatus::NeedsReview)
                .await
                .map_err(ProcessError::from)?;
            return Ok(());
        }

        self.consolidate(job_id, user_id).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_and_validate_row(
        &self,
        job_id: i64,
        row: &FieldRow,
        hash: &str,
        duplicate_emails: &HashSet<String>,
        existing_emails: &HashSet<String>,
        row_number: i64,
    ) -> Result<()> {
        let staging_id = self
            .db
            .staging_create(
                job_id,
                row.get("email").map(String::as_str),
                row.get("first_name").map(String::as_str),
                row.get("last_name").map(String::as_str),
                row.get("company").map(String::as_str),
                hash,
            )
            .await
            .map_err(ProcessError::from)?;

        match validator::validate(row, duplicate_emails, existing_emails) {
            ValidationOutcome::Valid => {
                self.db
                    .staging_set_status(staging_id, StagingStatus::Ready)
                    .await
                    .map_err(ProcessError::from)?;
            }
            ValidationOutcome::Invalid { issue_type, message } => {
                let normalized = row.get("email").map(|e| validator::normalize_email(e));
                let issue_key = match &normalized {
                    Some(e) if !e.is_empty() => e.clone(),
                    _ => format!("row_{row_number}"),
                };
                let issue_id = self
                    .db
                    .issue_get_or_create(job_id, issue_type, &issue_key, &message)
                    .await
                    .map_err(ProcessError::from)?;
                self.db
                    .issue_link_staging(issue_id, staging_id)
                    .await
                    .map_err(ProcessError::from)?;
                // staging was created in ISSUE status; nothing to flip.
            }
        }

        Ok(())
    }

    async fn reprocess_flow(&self, job_id: i64, user_id: &str) -> Result<()> {
        self.db
            .set_job_status(job_id, JobStatus::Processing)
            .await
            .map_err(ProcessError::from)?;

        let all_staging = self
            .db
            .staging_list_for_job(job_id)
            .await
            .map_err(ProcessError::from)?;

        let active: Vec<&StagingRow> = all_staging
            .iter()
            .filter(|s| {
                !matches!(
                    s.status().ok().flatten(),
                    Some(StagingStatus::Discard)
                )
            })
            .collect();

        let mut emails_seen: HashMap<String, u32> = HashMap::new();
        for s in &active {
            if let Some(email) = s.email.as_deref() {
                let normalized = validator::normalize_email(email);
                if !normalized.is_empty() {
                    *emails_seen.entry(normalized).or_insert(0) += 1;
                }
            }
        }
        let duplicate_emails: HashSet<String> = emails_seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(email, _)| email)
            .collect();

        let unique_emails: HashSet<String> = active
            .iter()
            .filter_map(|s| s.email.as_deref())
            .map(validator::normalize_email)
            .filter(|e| !e.is_empty())
            .collect();

        let existing_emails: HashSet<String> = self
            .db
            .contacts_existing_emails(user_id)
            .await
            .map_err(ProcessError::from)?
            .into_iter()
            .filter(|e| unique_emails.contains(e))
            .collect();

        let mut processed: u32 = 0;
        let active_ids: Vec<i64> = active.iter().map(|s| s.staging_id).collect();

        for staging_id in active_ids {
            if let Err(err) = self
                .revalidate_staging_row(job_id, staging_id, &duplicate_emails, &existing_emails)
                .await
            {
                warn!(job_id, staging_id, error = %err, "row-local failure, skipping row");
                continue;
            }
            processed += 1;
        }

        self.db
            .set_job_processed_rows(job_id, processed as i32)
            .await
            .map_err(ProcessError::from)?;
        self.db
            .refresh_job_issue_count(job_id)
            .await
            .map_err(ProcessError::from)?;

        if self
            .db
            .job_has_unresolved_issues(job_id)
            .await
            .map_err(ProcessError::from)?
        {
            self.db
                .set_job_status(job_id, JobStatus::NeedsReview)
                .await
                .map_err(ProcessError::from)?;
            return Ok(());
        }

        self.consolidate(job_id, user_id).await
    }

    async fn revalidate_staging_row(
        &self,
        job_id: i64,
        staging_id: i64,
        duplicate_emails: &HashSet<String>,
        existing_emails: &HashSet<String>,
    ) -> Result<()> {
        let staging = self
            .db
            .staging_get(staging_id)
            .await
            .map_err(ProcessError::from)?
            .ok_or_else(|| ProcessError::transient(anyhow::anyhow!("staging {staging_id} vanished mid-reprocess")))?;

        let row = row_from_staging(&staging);

        match validator::validate(&row, duplicate_emails, existing_emails) {
            ValidationOutcome::Valid => {
                self.db
                    .staging_set_status(staging_id, StagingStatus::Ready)
                    .await
                    .map_err(ProcessError::from)?;

                for issue_id in self.linked_issue_ids(staging_id).await? {
                    self.auto_resolve(issue_id).await?;
                }
            }
            ValidationOutcome::Invalid { issue_type, message } => {
                let normalized = staging.email.as_deref().map(validator::normalize_email);
                let issue_key = match &normalized {
                    Some(e) if !e.is_empty() => e.clone(),
                    _ => format!("staging_{staging_id}"),
                };

                let issue_id = self
                    .db
                    .issue_get_or_create(job_id, issue_type, &issue_key, &message)
                    .await
                    .map_err(ProcessError::from)?;

                self.un_resolve_if_other_staging_still_failing(issue_id, staging_id)
                    .await?;

                self.db
                    .issue_link_staging(issue_id, staging_id)
                    .await
                    .map_err(ProcessError::from)?;
                self.db
                    .staging_set_status(staging_id, StagingStatus::Issue)
                    .await
                    .map_err(ProcessError::from)?;
            }
        }

        Ok(())
    }

    /// Implements the preserved open-question behavior (§9): an issue only
    /// un-resolves on reprocess when it is currently resolved *and* some
    /// other linked staging row (besides the one currently failing) is
    /// already ISSUE. A simultaneous first-time failure across every
    /// linked row can leave the issue marked resolved for a transient
    /// window; this mirrors the source system rather than correcting it.
    async fn un_resolve_if_other_staging_still_failing(
        &self,
        issue_id: i64,
        failing_staging_id: i64,
    ) -> Result<()> {
        let issue = self.db.issue_get(issue_id).await.map_err(ProcessError::from)?;
        if !issue.resolved {
            return Ok(());
        }

        let linked = self.linked_issue_ids_staging(issue_id).await?;
        let mut unresolved_count = 0;
        for staging_id in linked {
            if staging_id == failing_staging_id {
                continue;
            }
            if let Some(staging) = self
                .db
                .staging_get(staging_id)
                .await
                .map_err(ProcessError::from)?
            {
                if staging.status().ok().flatten() == Some(StagingStatus::Issue) {
                    unresolved_count += 1;
                }
            }
        }

        if unresolved_count > 0 {
            self.db.issue_unresolve(issue_id).await.map_err(ProcessError::from)?;
        }

        Ok(())
    }

    async fn linked_issue_ids(&self, staging_id: i64) -> Result<Vec<i64>> {
        self.db
            .issue_ids_for_staging(staging_id)
            .await
            .map_err(ProcessError::from)
    }

    async fn linked_issue_ids_staging(&self, issue_id: i64) -> Result<Vec<i64>> {
        self.db
            .issue_item_staging_ids(issue_id)
            .await
            .map_err(ProcessError::from)
    }

    async fn auto_resolve(&self, issue_id: i64) -> Result<bool> {
        let staging_ids = self.linked_issue_ids_staging(issue_id).await?;
        let mut any_issue = false;
        for staging_id in &staging_ids {
            if let Some(staging) = self
                .db
                .staging_get(*staging_id)
                .await
                .map_err(ProcessError::from)?
            {
                if staging.status().ok().flatten() == Some(StagingStatus::Issue) {
                    any_issue = true;
                    break;
                }
            }
        }

        if !any_issue {
            self.db
                .issue_resolve(issue_id, defaults::AUTO_RESOLVE_ACTOR, defaults::AUTO_RESOLVE_COMMENT)
                .await
                .map_err(ProcessError::from)?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn consolidate(&self, job_id: i64, user_id: &str) -> Result<()> {
        let ready = self
            .db
            .staging_list_ready(job_id)
            .await
            .map_err(ProcessError::from)?;

        if ready.is_empty() {
            self.db
                .set_job_status(job_id, JobStatus::Completed)
                .await
                .map_err(ProcessError::from)?;
            return Ok(());
        }

        for s in &ready {
            let (email, first_name, last_name, company) = match (
                s.email.as_deref(),
                s.first_name.as_deref(),
                s.last_name.as_deref(),
                s.company.as_deref(),
            ) {
                (Some(e), Some(f), Some(l), Some(c))
                    if !e.trim().is_empty()
                        && !f.trim().is_empty()
                        && !l.trim().is_empty()
                        && !c.trim().is_empty() =>
                {
                    (e, f, l, c)
                }
                _ => {
                    warn!(job_id, staging_id = s.staging_id, "skipping consolidation of incomplete staging row");
                    continue;
                }
            };

            self.db
                .contact_create_from_staging(s.staging_id, user_id, email, first_name, last_name, company)
                .await
                .map_err(ProcessError::from)?;
            self.db
                .staging_set_status(s.staging_id, StagingStatus::Success)
                .await
                .map_err(ProcessError::from)?;
        }

        self.db
            .set_job_status(job_id, JobStatus::Completed)
            .await
            .map_err(ProcessError::from)?;

        Ok(())
    }
}

/// Reconstruct a `FieldRow` from a staging row's own columns, for
/// revalidation without re-reading the CSV (§4.4.2).
fn row_from_staging(staging: &StagingRow) -> FieldRow {
    let mut row = FieldRow::new();
    if let Some(v) = &staging.email {
        row.insert("email".to_string(), v.clone());
    }
    if let Some(v) = &staging.first_name {
        row.insert("first_name".to_string(), v.clone());
    }
    if let Some(v) = &staging.last_name {
        row.insert("last_name".to_string(), v.clone());
    }
    if let Some(v) = &staging.company {
        row.insert("company".to_string(), v.clone());
    }
    row
}

/// Duplicate-email detection within a batch (§4.5): group by normalized
/// email, flag any appearing in two or more rows. Rows with empty email
/// after trimming never participate.
fn duplicate_emails_in_batch(rows: &[FieldRow]) -> HashSet<String> {
    let mut seen: HashMap<String, u32> = HashMap::new();
    for row in rows {
        if let Some(email) = row.get("email") {
            let normalized = validator::normalize_email(email);
            if !normalized.is_empty() {
                *seen.entry(normalized).or_insert(0) += 1;
            }
        }
    }
    seen.into_iter().filter(|(_, n)| *n > 1).map(|(e, _)| e).collect()
}

fn all_non_empty_emails(rows: &[FieldRow]) -> HashSet<String> {
    rows.iter()
        .filter_map(|r| r.get("email"))
        .map(|e| validator::normalize_email(e))
        .filter(|e| !e.is_empty())
        .collect()
}
