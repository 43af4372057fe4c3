//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//! Provides error classification for retry and isolation decisions.
//!
//! ## Error Categories
//!
//! - **Transient**: Temporary server issues (retry with backoff)
//! - **RateLimit**: Remote throttling (wait and retry)
//! - **Network**: Connectivity issues (retry with backoff)
//! - **Auth**: Credential failures (fail fast)
//! - **BadRequest**: Malformed request (never retry)
//! - **NotFound**: Missing remote resource (never retry)
//!
//! ## Propagation
//!
//! Stage-local failures (one entity, one content block, one page) are isolated
//! and reported. Only `StateCorruption`, configuration errors and lock
//! contention abort a whole run.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories for retry decisions on external calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Authentication failed - fail fast, don't retry
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Invalid request - don't retry, fix request
    BadRequest,
    /// Remote resource does not exist
    NotFound,
    /// Temporary server issues - retry
    Transient,
    /// Unknown error - not retried
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is worth retrying against the same endpoint
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Transient)
    }
}

// =============================================================================
// External Call Error
// =============================================================================

/// Error from an external collaborator (generator or documentation platform)
#[derive(Debug, Clone)]
pub struct ExternalError {
    /// Error category for retry decisions
    pub category: ErrorCategory,
    /// Detailed error message
    pub message: String,
    /// Collaborator that produced the error
    pub source_name: Option<String>,
    /// Suggested wait time before retry (if the remote sent one)
    pub retry_after: Option<Duration>,
}

impl std::fmt::Display for ExternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(source) = &self.source_name {
            write!(f, "[{}:{}] {}", source, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for ExternalError {}

impl ExternalError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            source_name: None,
            retry_after: None,
        }
    }

    pub fn with_source(
        category: ErrorCategory,
        message: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            source_name: Some(source_name.into()),
            retry_after: None,
        }
    }

    /// Add suggested retry delay
    pub fn retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Classifies raw failures from external collaborators
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify HTTP status code directly
    pub fn classify_http_status(status: u16, message: &str, source: &str) -> ExternalError {
        match status {
            429 => ExternalError::with_source(ErrorCategory::RateLimit, message, source)
                .retry_after(Duration::from_secs(30)),
            401 | 403 => ExternalError::with_source(ErrorCategory::Auth, message, source),
            400 | 409 | 422 => ExternalError::with_source(ErrorCategory::BadRequest, message, source),
            404 | 410 => ExternalError::with_source(ErrorCategory::NotFound, message, source),
            408 | 500 | 502 | 503 | 504 => {
                ExternalError::with_source(ErrorCategory::Transient, message, source)
                    .retry_after(Duration::from_secs(5))
            }
            _ => ExternalError::with_source(ErrorCategory::Unknown, message, source),
        }
    }

    /// Classify a transport-level reqwest failure
    pub fn classify_reqwest(err: &reqwest::Error, source: &str) -> ExternalError {
        if let Some(status) = err.status() {
            return Self::classify_http_status(status.as_u16(), &err.to_string(), source);
        }
        if err.is_timeout() || err.is_connect() || err.is_request() {
            return ExternalError::with_source(ErrorCategory::Network, err.to_string(), source);
        }
        if err.is_decode() || err.is_body() {
            return ExternalError::with_source(ErrorCategory::Transient, err.to_string(), source);
        }
        ExternalError::with_source(ErrorCategory::Unknown, err.to_string(), source)
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum SyncError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Stage-local Errors (isolated per entity / block / page)
    // -------------------------------------------------------------------------
    /// Analysis artifact without a derivable stable identity
    #[error("Schema violation in {artifact}: {reason}")]
    SchemaViolation { artifact: String, reason: String },

    /// Content generation exhausted its retries
    #[error("Generation failed for {group} after {attempts} attempt(s): {reason}")]
    GenerationFailed {
        group: String,
        reason: String,
        attempts: u32,
    },

    /// Manual edit collision surfaced for human resolution
    #[error("Conflict on {page_key}: {reason}")]
    Conflict { page_key: String, reason: String },

    /// Platform mutation failed after retries
    #[error("Publish {operation} failed for {page_key}: {reason}")]
    PublishFailed {
        page_key: String,
        operation: String,
        reason: String,
    },

    /// Structured failure from an external collaborator
    #[error("{0}")]
    External(ExternalError),

    #[error("Parse error in {path}: {message}")]
    Parse { message: String, path: String },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Run-fatal Errors
    // -------------------------------------------------------------------------
    /// Persisted state could not be read; requires operator intervention
    #[error("State corruption: {0}")]
    StateCorruption(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not initialized: run 'wikisync init' first")]
    NotInitialized,

    #[error("Documentation root '{root}' is locked by another run")]
    Locked { root: String },

    #[error("Run cancelled before stage {stage}")]
    Cancelled { stage: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ExternalError> for SyncError {
    fn from(err: ExternalError) -> Self {
        SyncError::External(err)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl SyncError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a schema violation
    pub fn schema(artifact: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation {
            artifact: artifact.into(),
            reason: reason.into(),
        }
    }

    /// Create a state corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::StateCorruption(message.into())
    }

    /// Check if the failed external call may succeed when retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::External(e) => e.is_retryable(),
            Self::Timeout { .. } => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Check if this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StateCorruption(_)
                | Self::Config(_)
                | Self::NotInitialized
                | Self::Locked { .. }
                | Self::Cancelled { .. }
        )
    }

    /// Server-provided wait hint, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::External(e) => e.retry_after,
            _ => None,
        }
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| SyncError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| SyncError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
