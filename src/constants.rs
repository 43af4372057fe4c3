//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Content synthesis constants
pub mod synthesis {
    /// Retries after the first failed generation call
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Concurrent generation calls
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// Per-call timeout (seconds)
    pub const CALL_TIMEOUT_SECS: u64 = 300;
}

/// Publisher constants
pub mod publish {
    /// Retries after the first failed platform call
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Concurrently published top-level subtrees
    pub const DEFAULT_CONCURRENCY: usize = 4;

    /// Per-call timeout (seconds)
    pub const CALL_TIMEOUT_SECS: u64 = 60;
}

/// Block cache constants
pub mod cache {
    /// Cached blocks older than this are pruned by `wikisync clean --cache`
    pub const CACHE_EXPIRATION_DAYS: i64 = 30;
}

/// Analysis constants
pub mod analysis {
    /// Maximum file size to analyze (1MB)
    pub const MAX_FILE_SIZE: usize = 1_048_576;

    /// Suffix of normalized artifact files produced by external analyzers
    pub const ARTIFACT_SUFFIX: &str = ".entities.json";
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// Persistent state constants
pub mod state {
    /// Project data directory
    pub const DATA_DIR: &str = ".wikisync";

    /// State database path relative to the data directory
    pub const STATE_DB_PATH: &str = "state.db";

    /// Lock directory relative to the data directory
    pub const LOCK_DIR: &str = "locks";

    /// Run reports kept per database
    pub const RUN_HISTORY_KEEP: usize = 50;
}
