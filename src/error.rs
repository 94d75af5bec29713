//! # Error Types
//!
//! Structured error handling for the control plane using thiserror.
//!
//! Errors are split by concern: transport (channel plumbing), protocol
//! (envelope contents), database requests, and state entity validation.
//! Failures that cross a channel travel as typed reply payloads, never as
//! transport-level faults; the enums here are what those payloads decode to.

use thiserror::Error;

/// Channel plumbing failures: binding, connecting and moving envelopes.
///
/// Bind and connect failures are fatal at startup. Send timeouts and closed
/// endpoints mid-run are recoverable by the owning task.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("address already bound: {address}")]
    AddressInUse { address: String },

    #[error("no endpoint bound at address: {address}")]
    Unreachable { address: String },

    #[error("address {address} is bound with a different pattern (expected {expected})")]
    PatternMismatch { address: String, expected: String },

    #[error("send on {address} timed out under backpressure")]
    SendTimeout { address: String },

    #[error("endpoint at {address} is closed")]
    Closed { address: String },
}

/// Envelope-level failures. The offending request is rejected and answered
/// with an `ERROR` reply; the task servicing the channel keeps running.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("unknown verb: {verb}")]
    UnknownVerb { verb: String },

    #[error("malformed {verb} envelope: {reason}")]
    MalformedEnvelope { verb: String, reason: String },

    #[error("request/reply alternation violated on {address}: {operation} out of turn")]
    AlternationViolated { address: String, operation: String },
}

/// Failures surfaced to database clients as typed reply payloads.
///
/// `Rejected` means the request itself was invalid (duplicate key, missing
/// foreign key) and must never be retried; the contention variants mean the
/// broker or worker pool was unavailable and the caller may retry.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("request rejected: {reason}")]
    Rejected { reason: String },

    #[error("broker queue full, request refused")]
    BrokerOverloaded,

    #[error("worker handling the request stopped responding")]
    WorkerLost,

    #[error("no reply within {timeout_ms}ms after {attempts} attempt(s)")]
    Timeout { timeout_ms: u64, attempts: u32 },

    #[error("database unavailable: {message}")]
    Unavailable { message: String },

    #[error("worker failed: {message}")]
    WorkerFailure { message: String },
}

/// Validation failures raised when constructing lifecycle state entities.
/// Comparison is by payload; `Eq` is unavailable because of the `f64` field.
#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("cannot parse wheel filename: {filename}")]
    InvalidFilename { filename: String },

    #[error("invalid {algorithm} digest {digest:?}: {reason}")]
    InvalidHash {
        algorithm: String,
        digest: String,
        reason: String,
    },

    #[error("file size must be positive, got {size}")]
    InvalidSize { size: i64 },

    #[error("build duration must be non-negative, got {duration}")]
    InvalidDuration { duration: f64 },
}

/// Crate-level error collecting every concern.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("task {name} failed to stop within its grace period")]
    TaskStuck { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_errors_compare_by_payload() {
        assert_eq!(
            StateError::InvalidDuration { duration: -1.0 },
            StateError::InvalidDuration { duration: -1.0 }
        );
        assert_ne!(
            StateError::InvalidDuration { duration: -1.0 },
            StateError::InvalidSize { size: 0 }
        );
    }
}
