//! Transaction isolation levels.

/// Transaction isolation level requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted (dirty reads allowed).
    ReadUncommitted,
    /// Read committed (default for most engines).
    #[default]
    ReadCommitted,
    /// Repeatable read.
    RepeatableRead,
    /// Serializable (highest isolation).
    Serializable,
    /// Snapshot isolation (row versioning).
    Snapshot,
    /// Leave the engine's configured default in place.
    ProviderDefault,
}

impl IsolationLevel {
    /// Get the SQL statement to set this isolation level, if one is needed.
    ///
    /// `ProviderDefault` issues no statement at all.
    #[must_use]
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            Self::ReadUncommitted => Some("SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED"),
            Self::ReadCommitted => Some("SET TRANSACTION ISOLATION LEVEL READ COMMITTED"),
            Self::RepeatableRead => Some("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ"),
            Self::Serializable => Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"),
            Self::Snapshot => Some("SET TRANSACTION ISOLATION LEVEL SNAPSHOT"),
            Self::ProviderDefault => None,
        }
    }

    /// Get the isolation level name as commonly spelled in SQL.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
            Self::Snapshot => "SNAPSHOT",
            Self::ProviderDefault => "DEFAULT",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_sql() {
        assert_eq!(
            IsolationLevel::ReadCommitted.as_sql(),
            Some("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
        );
        assert_eq!(IsolationLevel::ProviderDefault.as_sql(), None);
    }

    #[test]
    fn test_default_isolation_level() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
    }
}
