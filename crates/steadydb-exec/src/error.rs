//! Execution-layer error taxonomy.

use thiserror::Error;

use steadydb_command::{TypeError, ValidationError};
use steadydb_driver::DriverError;

use crate::state::InvalidTransition;

/// Result alias for execution-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Faults surfaced by the execution layer.
///
/// Callers always receive one of these structured kinds for business-level
/// failures; only genuinely unexpected runtime errors propagate as panics.
#[derive(Debug, Error)]
pub enum Error {
    /// The command failed its pre-dispatch validation. Never retried; no
    /// connection was touched.
    #[error("command validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A driver fault classified as retryable.
    ///
    /// Single-shot execution retries these internally; a surfaced
    /// `Transient` means the caller opted out of retrying.
    #[error("transient fault: {0}")]
    Transient(DriverError),

    /// A driver fault that retrying cannot fix. Surfaced immediately after
    /// exactly one attempt.
    #[error("permanent fault: {0}")]
    Permanent(DriverError),

    /// An illegal state-machine move. Always a programming/usage error.
    #[error(transparent)]
    InvalidStateTransition(#[from] InvalidTransition),

    /// The retry budget ran out; carries the last transient fault observed.
    #[error("retry budget exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Total attempts made (including the first).
        attempts: u32,
        /// The last transient fault observed.
        source: DriverError,
    },

    /// A failure inside an active transaction. The transaction is now
    /// `Faulted`; the caller must roll back or dispose. Never auto-retried.
    #[error("transaction fault: {source}")]
    Transaction {
        /// The underlying driver fault.
        source: DriverError,
    },

    /// A savepoint with this name already exists in the active transaction.
    #[error("savepoint '{0}' already exists")]
    SavepointExists(String),

    /// No savepoint with this name exists in the active transaction.
    #[error("no such savepoint '{0}'")]
    UnknownSavepoint(String),

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// A result value could not be converted to the requested type.
    #[error("result conversion failed: {0}")]
    Type(#[from] TypeError),

    /// The executor configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// The underlying driver fault, when one exists.
    #[must_use]
    pub fn driver_fault(&self) -> Option<&DriverError> {
        match self {
            Self::Transient(e) | Self::Permanent(e) => Some(e),
            Self::RetryExhausted { source, .. } | Self::Transaction { source } => Some(source),
            _ => None,
        }
    }
}
