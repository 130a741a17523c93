//! Command definition and validation.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ValidationError;
use crate::value::Value;

/// The kind of data-access operation a command represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Read rows.
    Query,
    /// Insert rows; reports an affected-row count.
    Insert,
    /// Update rows; reports an affected-row count.
    Update,
    /// Delete rows; reports an affected-row count.
    Delete,
    /// Insert-or-update in a single server-side round trip.
    Upsert,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Query => "query",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Upsert => "upsert",
        };
        f.write_str(name)
    }
}

impl CommandKind {
    /// Whether this kind writes data and therefore requires a target.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Query)
    }
}

/// An abstract data-access command.
///
/// Built with the fluent methods below and validated before dispatch.
/// The command never carries SQL text; the driver derives whatever wire
/// traffic the target engine needs.
///
/// # Example
///
/// ```rust
/// use steadydb_command::Command;
///
/// let cmd = Command::insert("orders")
///     .parameter("customer_id", 42i64)
///     .parameter("total", 99.5f64);
/// assert!(cmd.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Operation kind.
    pub kind: CommandKind,
    /// Target object (table, collection) the command addresses.
    pub target: Option<String>,
    /// Named parameters, insertion-independent ordering.
    pub parameters: BTreeMap<String, Value>,
    /// Per-command timeout override.
    pub timeout: Option<Duration>,
}

impl Command {
    /// Create a command of the given kind with no target or parameters.
    #[must_use]
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            target: None,
            parameters: BTreeMap::new(),
            timeout: None,
        }
    }

    /// Create a query command.
    #[must_use]
    pub fn query() -> Self {
        Self::new(CommandKind::Query)
    }

    /// Create an insert command against `target`.
    #[must_use]
    pub fn insert(target: impl Into<String>) -> Self {
        Self::new(CommandKind::Insert).target(target)
    }

    /// Create an update command against `target`.
    #[must_use]
    pub fn update(target: impl Into<String>) -> Self {
        Self::new(CommandKind::Update).target(target)
    }

    /// Create a delete command against `target`.
    #[must_use]
    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(CommandKind::Delete).target(target)
    }

    /// Create an upsert command against `target`.
    #[must_use]
    pub fn upsert(target: impl Into<String>) -> Self {
        Self::new(CommandKind::Upsert).target(target)
    }

    /// Set the target object.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Add a named parameter.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Set a per-command timeout, overriding the executor default.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate the command shape.
    ///
    /// This is a self-contained check that runs before any connection is
    /// acquired:
    ///
    /// - mutation kinds require a target;
    /// - target and parameter names must be valid identifiers;
    /// - insert/upsert must carry at least one parameter;
    /// - a present timeout must be non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.target {
            Some(target) => validate_identifier(target)?,
            None if self.kind.is_mutation() => {
                return Err(ValidationError::MissingTarget { kind: self.kind });
            }
            None => {}
        }

        for name in self.parameters.keys() {
            validate_identifier(name)?;
        }

        if matches!(self.kind, CommandKind::Insert | CommandKind::Upsert)
            && self.parameters.is_empty()
        {
            return Err(ValidationError::NoParameters { kind: self.kind });
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(ValidationError::ZeroTimeout);
        }

        Ok(())
    }
}

/// Validate an identifier (target name, parameter name, savepoint name).
///
/// Rejects anything that could smuggle statement text into a driver.
pub fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static IDENTIFIER_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_@#$]{0,127}$").unwrap());

    if name.is_empty() {
        return Err(ValidationError::InvalidIdentifier {
            name: name.to_string(),
            reason: "identifier cannot be empty",
        });
    }

    if !IDENTIFIER_RE.is_match(name) {
        return Err(ValidationError::InvalidIdentifier {
            name: name.to_string(),
            reason: "must start with letter/underscore, contain only \
                     alphanumerics/_/@/#/$, and be 1-128 characters",
        });
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("my_table").is_ok());
        assert!(validate_identifier("Orders123").is_ok());
        assert!(validate_identifier("_private").is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("123abc").is_err());
        assert!(validate_identifier("table-name").is_err());
        assert!(validate_identifier("table name").is_err());
        assert!(validate_identifier("orders;DROP TABLE orders").is_err());
    }

    #[test]
    fn test_mutation_requires_target() {
        let cmd = Command::new(CommandKind::Update);
        assert_eq!(
            cmd.validate(),
            Err(ValidationError::MissingTarget {
                kind: CommandKind::Update
            })
        );
    }

    #[test]
    fn test_query_target_optional() {
        assert!(Command::query().validate().is_ok());
        assert!(Command::query().target("orders").validate().is_ok());
    }

    #[test]
    fn test_insert_requires_parameters() {
        let cmd = Command::insert("orders");
        assert_eq!(
            cmd.validate(),
            Err(ValidationError::NoParameters {
                kind: CommandKind::Insert
            })
        );
        assert!(cmd.parameter("id", 1i64).validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cmd = Command::delete("orders").timeout(Duration::ZERO);
        assert_eq!(cmd.validate(), Err(ValidationError::ZeroTimeout));
    }

    #[test]
    fn test_bad_parameter_name_rejected() {
        let cmd = Command::insert("orders").parameter("bad name", 1i64);
        assert!(matches!(
            cmd.validate(),
            Err(ValidationError::InvalidIdentifier { .. })
        ));
    }
}
