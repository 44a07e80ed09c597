//! Shared domain types for the contact ingest worker.
//!
//! These are the single source of truth for the five-table data model in
//! [`contact_ingest_db`] and the state machine driven by the job processor.

use serde::{Deserialize, Serialize};

/// Status of a [`Job`](crate) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    NeedsReview,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::NeedsReview => "NEEDS_REVIEW",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "NEEDS_REVIEW" => Some(Self::NeedsReview),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step
    /// (§3: "Lifecycles"). `COMPLETED` is terminal; `PROCESSING` accepts a
    /// same-state transition so a redelivered message mid-job doesn't get
    /// rejected by its own retry.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Processing)
                | (Self::Processing, Self::NeedsReview)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::NeedsReview, Self::Processing)
                | (Self::Failed, Self::Processing)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a [`Staging`](crate) row. Nullable in the physical schema (see
/// `staging.status`); the worker itself always writes a concrete value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StagingStatus {
    Ready,
    Success,
    Discard,
    Issue,
}

impl StagingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Success => "SUCCESS",
            Self::Discard => "DISCARD",
            Self::Issue => "ISSUE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "READY" => Some(Self::Ready),
            "SUCCESS" => Some(Self::Success),
            "DISCARD" => Some(Self::Discard),
            "ISSUE" => Some(Self::Issue),
            _ => None,
        }
    }
}

impl std::fmt::Display for StagingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Defect classification for an [`Issue`](crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    DuplicateEmail,
    InvalidEmail,
    ExistingEmail,
    MissingRequiredField,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateEmail => "DUPLICATE_EMAIL",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::ExistingEmail => "EXISTING_EMAIL",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DUPLICATE_EMAIL" => Some(Self::DuplicateEmail),
            "INVALID_EMAIL" => Some(Self::InvalidEmail),
            "EXISTING_EMAIL" => Some(Self::ExistingEmail),
            "MISSING_REQUIRED_FIELD" => Some(Self::MissingRequiredField),
            _ => None,
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a queue message dispatching one job to the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub job_id: i64,
    pub s3_key: String,
}

/// One raw CSV/staging row as a field-name -> value map, the shape both the
/// CSV decoder and the reprocess flow feed into the row validator.
pub type FieldRow = std::collections::BTreeMap<String, String>;
