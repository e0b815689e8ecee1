//! Error categories shared across the core (spec §7).

use thiserror::Error;

/// Unified error type for Orion Sentinel components.
///
/// Every fallible operation in the core returns one of these five
/// categories; components decide locally whether to retry, skip, or
/// surface the error as a `health_status` event.
#[derive(Error, Debug)]
pub enum OrionError {
    /// Transient network/IO failure; caller should retry with backoff.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Permanent failure (e.g. 4xx); do not retry.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Malformed input; the record is skipped and logged.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Idempotent write race; resolved by last-writer-wins on timestamps.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Cooperative cancellation in progress.
    #[error("shutdown")]
    Shutdown,

    /// Config or store corruption detected at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Wraps an I/O error from disk persistence.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wraps a JSON (de)serialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result alias for the core.
pub type OrionResult<T> = Result<T, OrionError>;
