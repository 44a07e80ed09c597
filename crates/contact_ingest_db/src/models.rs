//! Row types for the five tables of the data model.
//!
//! Status columns are stored as `TEXT` and parsed through
//! [`contact_ingest_protocol`]'s enums rather than relying on a Postgres
//! native enum type, so schema evolution (a new issue type, say) never
//! requires an `ALTER TYPE`.

use chrono::{DateTime, Utc};
use contact_ingest_protocol::{IssueType, JobStatus, StagingStatus};
use sqlx::FromRow;

use crate::error::{DbError, Result};

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub job_id: i64,
    pub user_id: String,
    pub original_filename: String,
    pub object_key: String,
    pub status: String,
    pub total_rows: i32,
    pub processed_rows: i32,
    pub issue_count: i32,
    pub process_start: Option<DateTime<Utc>>,
    pub process_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JobRow {
    pub fn status(&self) -> Result<JobStatus> {
        JobStatus::parse(&self.status)
            .ok_or_else(|| DbError::invalid_input(format!("unknown job status: {}", self.status)))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StagingRow {
    pub staging_id: i64,
    pub job_id: i64,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    pub row_hash: String,
    pub created_at: DateTime<Utc>,
}

impl StagingRow {
    pub fn status(&self) -> Result<Option<StagingStatus>> {
        match &self.status {
            None => Ok(None),
            Some(s) => StagingStatus::parse(s)
                .map(Some)
                .ok_or_else(|| DbError::invalid_input(format!("unknown staging status: {s}"))),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct IssueRow {
    pub issue_id: i64,
    pub job_id: i64,
    pub issue_type: String,
    pub issue_key: String,
    pub resolved: bool,
    pub description: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IssueRow {
    pub fn issue_type(&self) -> Result<IssueType> {
        IssueType::parse(&self.issue_type)
            .ok_or_else(|| DbError::invalid_input(format!("unknown issue type: {}", self.issue_type)))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct IssueItemRow {
    pub issue_item_id: i64,
    pub issue_id: i64,
    pub staging_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ContactRow {
    pub contact_id: i64,
    pub staging_id: i64,
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub created_at: DateTime<Utc>,
}
