//! Repository methods for the `contacts` table: the durable output of a
//! successful ingestion.

use crate::error::{DbError, Result};
use crate::models::ContactRow;
use crate::ContactDb;

impl ContactDb {
    /// Emails already on file for a user, lowercased. Used by duplicate
    /// detection to classify a staging row as `EXISTING_EMAIL` rather than
    /// `DUPLICATE_EMAIL` (invariant I5: existing contacts win precedence).
    pub async fn contacts_existing_emails(&self, user_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT email FROM contacts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Promote a validated staging row into a durable contact. Fails if the
    /// staging row was already promoted (`staging_id` is unique), or if
    /// `user_id` or any of the four staging fields is empty/whitespace-only
    /// (§4.3: "requires all four staging fields non-empty and `user_id`
    /// non-empty").
    pub async fn contact_create_from_staging(
        &self,
        staging_id: i64,
        user_id: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
        company: &str,
    ) -> Result<i64> {
        for (field, value) in [
            ("user_id", user_id),
            ("email", email),
            ("first_name", first_name),
            ("last_name", last_name),
            ("company", company),
        ] {
            if value.trim().is_empty() {
                return Err(DbError::invalid_input(format!(
                    "cannot create contact from staging {staging_id}: '{field}' is empty"
                )));
            }
        }

        let row = sqlx::query_as::<_, (i64,)>(
            r#"INSERT INTO contacts (staging_id, user_id, email, first_name, last_name, company)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING contact_id"#,
        )
        .bind(staging_id)
        .bind(user_id)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(company)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Fetch a contact by the staging row it was promoted from.
    pub async fn contact_get_by_staging(&self, staging_id: i64) -> Result<Option<ContactRow>> {
        let row = sqlx::query_as::<_, ContactRow>(
            "SELECT * FROM contacts WHERE staging_id = $1",
        )
        .bind(staging_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Count of contacts created for a job, joined through staging.
    pub async fn contacts_count_for_job(&self, job_id: i64) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"SELECT COUNT(*) FROM contacts c
               JOIN staging s ON s.staging_id = c.staging_id
               WHERE s.job_id = $1"#,
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }
}
