//! Environment-sourced worker configuration.
//!
//! Mirrors the settings table of the specification: every field can be
//! supplied as a CLI flag or an environment variable of the same name
//! (flags win), with the documented defaults applied when both are absent.

use clap::Parser;

use crate::defaults;

/// Canonical settings for the contact ingest worker.
#[derive(Parser, Debug, Clone)]
#[command(name = "contact-ingest-worker", about = "CSV contact list ingestion worker")]
pub struct Settings {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Blob container (S3 bucket) holding uploaded CSV objects.
    #[arg(long = "bucket", env = "CSV_BUCKET_NAME")]
    pub csv_bucket_name: String,

    /// Region for the blob and queue clients.
    #[arg(long = "region", env = "AWS_REGION", default_value = defaults::DEFAULT_AWS_REGION)]
    pub aws_region: String,

    /// Queue endpoint URL.
    #[arg(long = "queue-url", env = "SQS_QUEUE_URL")]
    pub sqs_queue_url: String,

    /// Maximum number of messages to request per receive call.
    #[arg(long, env = "SQS_MAX_NUMBER_OF_MESSAGES", default_value_t = defaults::DEFAULT_SQS_MAX_NUMBER_OF_MESSAGES)]
    pub sqs_max_number_of_messages: i32,

    /// Long-poll wait time, in seconds.
    #[arg(long, env = "SQS_WAIT_TIME_SECONDS", default_value_t = defaults::DEFAULT_SQS_WAIT_TIME_SECONDS)]
    pub sqs_wait_time_seconds: i32,

    /// Message invisibility window, in seconds.
    #[arg(long, env = "SQS_VISIBILITY_TIMEOUT", default_value_t = defaults::DEFAULT_SQS_VISIBILITY_TIMEOUT)]
    pub sqs_visibility_timeout: i32,

    /// Retry budget for transient infrastructure errors.
    #[arg(long, env = "MAX_RETRIES", default_value_t = defaults::DEFAULT_MAX_RETRIES)]
    pub max_retries: u32,

    /// Delay between retries of transient infrastructure errors, in seconds.
    #[arg(long, env = "RETRY_DELAY_SECONDS", default_value_t = defaults::DEFAULT_RETRY_DELAY_SECONDS)]
    pub retry_delay_seconds: u64,

    /// Row count between interim `processed_rows` checkpoints.
    #[arg(long, env = "PROGRESS_UPDATE_INTERVAL", default_value_t = defaults::DEFAULT_PROGRESS_UPDATE_INTERVAL)]
    pub progress_update_interval: u32,

    /// Log level filter (error, warn, info, debug, trace).
    #[arg(long, env = "LOG_LEVEL", default_value = defaults::DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Log renderer: "json" for one JSON object per line, anything else for
    /// a human-readable line.
    #[arg(long, env = "LOG_FORMAT", default_value = defaults::DEFAULT_LOG_FORMAT)]
    pub log_format: String,
}

impl Settings {
    /// Load settings from CLI args and environment, applying `.env` first if present.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Settings::parse()
    }

    pub fn log_format_is_json(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
