//! Error types for the attribution engine
//!
//! One taxonomy for the whole engine. Callers can branch on retryability:
//! `InvalidInput` and `Configuration` need a fixed caller, `PolicyNotMet`
//! is a legitimate no-event outcome, `DerivationFailed` is retryable with
//! backoff.

use thiserror::Error;
use uuid::Uuid;

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Engine error taxonomy
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed probe audio, vector dimension mismatch, out-of-range
    /// confidence. Not retryable; the caller must fix the input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Correlation or threshold conditions unmet. Not a failure to surface
    /// to users; no event is the correct outcome.
    #[error("policy not met for result {result_id} (track {track_id})")]
    PolicyNotMet { result_id: Uuid, track_id: Uuid },

    /// Storage unavailable after the internal retry. Retryable by the
    /// caller with backoff. Carries the pair ids for the audit trail.
    #[error("derivation failed for result {result_id} (track {track_id}): {source}")]
    DerivationFailed {
        result_id: Uuid,
        track_id: Uuid,
        #[source]
        source: dualproof_common::Error,
    },

    /// Thresholds or window out of valid range. Fails fast at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Referenced row missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage error outside the derivation critical section
    #[error(transparent)]
    Storage(#[from] dualproof_common::Error),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Storage(dualproof_common::Error::Database(err))
    }
}
