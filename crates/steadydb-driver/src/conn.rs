//! Driver and connection traits.

use std::time::Duration;

use async_trait::async_trait;
use steadydb_command::{Command, Row};

use crate::error::DriverError;
use crate::isolation::IsolationLevel;

/// Result of an upsert, decided server-side in a single round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The engine reported how many rows were written.
    RowsAffected(u64),
    /// The engine returned the identity value of the written row.
    GeneratedKey(i64),
}

/// A source of physical connections.
///
/// Implementations typically wrap a connection pool; the execution layer
/// treats each opened connection as an opaque leased handle it must release
/// exactly once.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a physical connection, waiting at most `timeout`.
    async fn open(&self, timeout: Duration) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// One physical connection to the engine.
///
/// All methods take `&mut self`: a connection carries exactly one in-flight
/// operation at a time. Transaction control methods operate on the
/// engine-level transaction bound to this connection.
#[async_trait]
pub trait DriverConnection: Send {
    /// Execute a query command and return its rows.
    async fn query(&mut self, command: &Command) -> Result<Vec<Row>, DriverError>;

    /// Execute an insert/update/delete command and return the affected-row
    /// count.
    async fn mutate(&mut self, command: &Command) -> Result<u64, DriverError>;

    /// Execute an upsert command as a single insert-or-update round trip.
    async fn upsert(&mut self, command: &Command) -> Result<UpsertOutcome, DriverError>;

    /// Begin an engine-level transaction at the given isolation level.
    async fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DriverError>;

    /// Commit the engine-level transaction.
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// Roll back the engine-level transaction.
    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// Create a named savepoint inside the engine-level transaction.
    async fn savepoint(&mut self, name: &str) -> Result<(), DriverError>;

    /// Roll back to a named savepoint inside the engine-level transaction.
    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DriverError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traits_are_object_safe() {
        fn _assert_driver(_: &dyn Driver) {}
        fn _assert_connection(_: &dyn DriverConnection) {}
    }
}
