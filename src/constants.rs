//! # System Constants
//!
//! Defaults shared by configuration, the orchestrator and the worker payload
//! format. Configuration files override every value here except the payload
//! field name, which is part of the worker contract.

use std::time::Duration;

/// Default maximum number of batches Running at once
pub const DEFAULT_CONCURRENCY_CAP: usize = 10;

/// Default number of batches the workload is split into
pub const DEFAULT_BATCH_COUNT: usize = 10;

/// Default stable name of the execution definition
pub const DEFAULT_DEFINITION_NAME: &str = "fanout";

/// Default worker function identity recorded on the definition
pub const DEFAULT_WORKER_FUNCTION: &str = "fanout-worker";

/// Seed location used when configuration does not name one
pub const DEFAULT_SEED_LOCATION: &str = "http://books.toscrape.com/";

/// Upper bound on pages followed during link discovery
pub const DEFAULT_MAX_PAGES: usize = 10_000;

/// Retry policy defaults
pub mod retry {
    use super::Duration;
    use crate::worker::ErrorKind;

    /// Delay before the second attempt
    pub const BASE_INTERVAL: Duration = Duration::from_secs(2);

    /// Multiplier applied to the delay for each further attempt
    pub const BACKOFF_RATE: f64 = 2.0;

    /// Total attempts, including the first one
    pub const MAX_ATTEMPTS: u32 = 6;

    /// Error kinds retried by default
    pub const RETRYABLE_ERRORS: [ErrorKind; 5] = [
        ErrorKind::ServiceException,
        ErrorKind::ClientException,
        ErrorKind::ThrottlingException,
        ErrorKind::GenericTaskFailure,
        ErrorKind::UnknownTransientError,
    ];
}

/// Environment variable names
pub mod env {
    /// Selects the configuration environment overlay
    pub const ENVIRONMENT: &str = "FANOUT_ENV";

    /// Generic fallback for the environment name
    pub const APP_ENVIRONMENT: &str = "APP_ENV";

    /// Overrides the configuration directory
    pub const CONFIG_DIR: &str = "FANOUT_CONFIG_DIR";

    /// Prefix for per-key configuration overrides (`FANOUT__DISPATCH__CONCURRENCY_CAP`)
    pub const OVERRIDE_PREFIX: &str = "FANOUT";

    /// `json` switches log output to JSON lines
    pub const LOG_FORMAT: &str = "FANOUT_LOG_FORMAT";
}
