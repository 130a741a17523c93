//! Command-level error types.

use thiserror::Error;

use crate::command::CommandKind;

/// Errors produced by [`Command::validate`](crate::Command::validate).
///
/// A validation failure is always a caller error: it is reported before any
/// connection is acquired and is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A mutation command was built without a target.
    #[error("{kind} command requires a target")]
    MissingTarget {
        /// The offending command kind.
        kind: CommandKind,
    },

    /// A target or parameter name failed the identifier check.
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier {
        /// The rejected identifier.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An insert or upsert carried no parameters to write.
    #[error("{kind} command requires at least one parameter")]
    NoParameters {
        /// The offending command kind.
        kind: CommandKind,
    },

    /// A per-command timeout of zero was requested.
    #[error("command timeout must be non-zero")]
    ZeroTimeout,
}

/// Errors converting a [`Value`](crate::Value) into a concrete Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// The value holds a different type than requested.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The requested type.
        expected: &'static str,
        /// The type actually held.
        actual: &'static str,
    },

    /// A NULL value was read through a non-nullable accessor.
    #[error("unexpected NULL value")]
    UnexpectedNull,

    /// An integer value does not fit the requested type.
    #[error("value {value} out of range for {target}")]
    OutOfRange {
        /// The requested type.
        target: &'static str,
        /// The stored value.
        value: i64,
    },

    /// A column index or name did not resolve.
    #[error("no such column: {0}")]
    NoSuchColumn(String),
}
