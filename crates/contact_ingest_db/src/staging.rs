//! Repository methods for the `staging` table, including the row-hash
//! computation used for idempotent re-ingestion (invariant I2: the same
//! logical row, seen twice in the same job, is staged once).

use std::collections::BTreeMap;

use contact_ingest_protocol::{FieldRow, StagingStatus};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::StagingRow;
use crate::ContactDb;

/// The idempotency fingerprint for one CSV row: SHA-256 over a
/// canonicalized `{job_id, row_number, email, first_name, last_name,
/// company}` map, serialized as JSON with sorted keys. `email` is
/// lowercased and trimmed before hashing, the other fields only trimmed,
/// so the fingerprint is stable across re-ingestion of an unchanged row
/// regardless of incidental casing or whitespace differences upstream.
pub fn row_hash(job_id: i64, row_number: i64, row: &FieldRow) -> String {
    let get = |key: &str| row.get(key).map(|v| v.trim()).unwrap_or("");

    let mut canonical: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
    canonical.insert("job_id", serde_json::Value::from(job_id));
    canonical.insert("row_number", serde_json::Value::from(row_number));
    canonical.insert("email", serde_json::Value::from(get("email").to_lowercase()));
    canonical.insert("first_name", serde_json::Value::from(get("first_name")));
    canonical.insert("last_name", serde_json::Value::from(get("last_name")));
    canonical.insert("company", serde_json::Value::from(get("company")));

    let encoded = serde_json::to_vec(&canonical).expect("canonical row map always serializes");
    let digest = Sha256::digest(&encoded);
    hex::encode(digest)
}

impl ContactDb {
    /// Look up an already-staged row for this job by its content hash.
    pub async fn staging_find_by_hash(
        &self,
        job_id: i64,
        row_hash: &str,
    ) -> Result<Option<StagingRow>> {
        let row = sqlx::query_as::<_, StagingRow>(
            "SELECT * FROM staging WHERE job_id = $1 AND row_hash = $2",
        )
        .bind(job_id)
        .bind(row_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert a new staging row with the provisional default status
    /// `ISSUE`, awaiting validation (§4.4.1 step 4): the caller flips it
    /// to `READY` once the row passes validation. Returns the new staging
    /// id.
    pub async fn staging_create(
        &self,
        job_id: i64,
        email: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
        company: Option<&str>,
        row_hash: &str,
    ) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"INSERT INTO staging (job_id, email, first_name, last_name, company, status, row_hash)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING staging_id"#,
        )
        .bind(job_id)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(company)
        .bind(StagingStatus::Issue.as_str())
        .bind(row_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Fetch a staging row by id.
    pub async fn staging_get(&self, staging_id: i64) -> Result<Option<StagingRow>> {
        let row = sqlx::query_as::<_, StagingRow>("SELECT * FROM staging WHERE staging_id = $1")
            .bind(staging_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// All staging rows for a job, oldest first (the order rows were
    /// appended to the CSV).
    pub async fn staging_list_for_job(&self, job_id: i64) -> Result<Vec<StagingRow>> {
        let rows = sqlx::query_as::<_, StagingRow>(
            "SELECT * FROM staging WHERE job_id = $1 ORDER BY staging_id ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Staging rows still in `READY`, the set consolidation must resolve
    /// before a job can leave `PROCESSING`.
    pub async fn staging_list_ready(&self, job_id: i64) -> Result<Vec<StagingRow>> {
        let rows = sqlx::query_as::<_, StagingRow>(
            "SELECT * FROM staging WHERE job_id = $1 AND status = $2 ORDER BY staging_id ASC",
        )
        .bind(job_id)
        .bind(StagingStatus::Ready.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Set a staging row's disposition (`SUCCESS`, `DISCARD`, or `ISSUE`).
    pub async fn staging_set_status(&self, staging_id: i64, status: StagingStatus) -> Result<()> {
        sqlx::query("UPDATE staging SET status = $1 WHERE staging_id = $2")
            .bind(status.as_str())
            .bind(staging_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// True if any staging row for the job still carries the given status.
    pub async fn staging_has_status(&self, job_id: i64, status: StagingStatus) -> Result<bool> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM staging WHERE job_id = $1 AND status = $2",
        )
        .bind(job_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0 > 0)
    }

    /// Count staging rows for a job grouped by a single status, used for
    /// the job-summary counters surfaced at the end of a run.
    pub async fn staging_count_status(&self, job_id: i64, status: StagingStatus) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM staging WHERE job_id = $1 AND status = $2",
        )
        .bind(job_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_hash_is_order_independent() {
        let mut a = FieldRow::new();
        a.insert("email".into(), "a@example.com".into());
        a.insert("first_name".into(), "Ada".into());

        let mut b = FieldRow::new();
        b.insert("first_name".into(), "Ada".into());
        b.insert("email".into(), "a@example.com".into());

        assert_eq!(row_hash(1, 1, &a), row_hash(1, 1, &b));
    }

    #[test]
    fn row_hash_ignores_email_case_and_whitespace() {
        let mut a = FieldRow::new();
        a.insert("email".into(), "A@Example.com".into());

        let mut b = FieldRow::new();
        b.insert("email".into(), "  a@example.com  ".into());

        assert_eq!(row_hash(1, 1, &a), row_hash(1, 1, &b));
    }

    #[test]
    fn row_hash_differs_on_content() {
        let mut a = FieldRow::new();
        a.insert("email".into(), "a@example.com".into());

        let mut b = FieldRow::new();
        b.insert("email".into(), "b@example.com".into());

        assert_ne!(row_hash(1, 1, &a), row_hash(1, 1, &b));
    }

    #[test]
    fn row_hash_differs_on_row_number() {
        let mut a = FieldRow::new();
        a.insert("email".into(), "a@example.com".into());

        assert_ne!(row_hash(1, 1, &a), row_hash(1, 2, &a));
    }
}
