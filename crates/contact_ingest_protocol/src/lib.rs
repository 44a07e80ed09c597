//! Shared types, defaults, and configuration for the contact ingest worker.
//!
//! Kept dependency-light and database-free so it can be used by the data
//! access layer, the worker binary, and tests alike.

pub mod config;
pub mod defaults;
pub mod types;

pub use config::Settings;
pub use types::{FieldRow, IssueType, JobMessage, JobStatus, StagingStatus};
