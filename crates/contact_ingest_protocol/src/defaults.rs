//! Canonical default values for settings not explicitly supplied via the environment.

pub const DEFAULT_AWS_REGION: &str = "us-east-1";
pub const DEFAULT_SQS_MAX_NUMBER_OF_MESSAGES: i32 = 1;
pub const DEFAULT_SQS_WAIT_TIME_SECONDS: i32 = 20;
pub const DEFAULT_SQS_VISIBILITY_TIMEOUT: i32 = 300;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 5;
pub const DEFAULT_PROGRESS_UPDATE_INTERVAL: u32 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FORMAT: &str = "json";

/// Fixed resolution comment applied when an issue auto-resolves during reprocessing.
pub const AUTO_RESOLVE_COMMENT: &str = "All related staging records resolved during reprocessing";
/// Fixed `resolved_by` value applied on auto-resolution.
pub const AUTO_RESOLVE_ACTOR: &str = "system";
