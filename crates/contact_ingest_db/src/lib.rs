//! Data access layer for the contact ingest worker.
//!
//! Wraps a single Postgres pool behind repository-style methods, one module
//! per table: [`jobs`], [`staging`], [`issues`], [`contacts`]. Callers never
//! see `sqlx` types directly outside of [`models`].

mod contacts;
pub mod error;
mod issues;
mod jobs;
pub mod models;
mod schema;
mod staging;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use error::{DbError, Result};
pub use models::{ContactRow, IssueItemRow, IssueRow, JobRow, StagingRow};
pub use staging::row_hash;

/// Handle to the contact ingest database. Cheap to clone; internally an
/// `Arc`-backed connection pool.
#[derive(Clone)]
pub struct ContactDb {
    pool: PgPool,
}

impl ContactDb {
    /// Connect to `database_url` and verify the schema exists, creating it
    /// if this is a fresh database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Wrap an already-constructed pool. Used by tests that build a pool
    /// against a throwaway database.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Expose the underlying pool for callers that need a raw transaction
    /// spanning more than one repository method (job claim + staging writes).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
