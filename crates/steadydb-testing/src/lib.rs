//! # steadydb-testing
//!
//! Test infrastructure for the steadydb execution layer.
//!
//! [`FakeDriver`] implements the driver boundary against an in-memory
//! script: tests enqueue one [`FakeResponse`] per expected dispatch, and the
//! driver records every call it receives in a shared [`Event`] journal.
//! Assertions read the journal to check, for example, that an implicit
//! rollback was actually issued on the connection during disposal.
//!
//! This crate exists separately so the execution layer can use it as a
//! dev-dependency without a dependency cycle.

#![warn(missing_docs)]
#![deny(unsafe_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use steadydb_command::{Command, CommandKind, Row};
use steadydb_driver::{
    Driver, DriverConnection, DriverError, FaultCode, IsolationLevel, UpsertOutcome,
};

/// One scripted response, consumed by the next dispatched command.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// Answer a query with these rows.
    Rows(Vec<Row>),
    /// Answer a mutation with this affected-row count.
    Affected(u64),
    /// Answer an upsert with this outcome.
    Upsert(UpsertOutcome),
    /// Fail the dispatch with this fault code.
    Fail(FaultCode),
    /// Never answer; the dispatch hangs until the caller's timeout or
    /// cancellation fires.
    Stall,
}

/// A recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A connection was opened.
    Opened,
    /// An open attempt failed (scripted).
    OpenFailed,
    /// A connection was closed gracefully.
    Closed,
    /// An engine-level transaction was begun.
    Begun(IsolationLevel),
    /// The engine-level transaction committed.
    Committed,
    /// The engine-level transaction rolled back.
    RolledBack,
    /// An engine-level savepoint was created.
    SavepointCreated(String),
    /// The engine rolled back to a savepoint.
    RolledBackTo(String),
    /// A command was dispatched.
    Dispatched(CommandKind),
}

#[derive(Default)]
struct Inner {
    script: Mutex<VecDeque<FakeResponse>>,
    open_failures: Mutex<VecDeque<FaultCode>>,
    commit_failures: Mutex<VecDeque<FaultCode>>,
    journal: Mutex<Vec<Event>>,
}

impl Inner {
    fn record(&self, event: Event) {
        self.journal.lock().push(event);
    }
}

/// A scriptable in-memory driver.
///
/// Clone handles share the script and journal, so a test can keep one handle
/// for assertions while the executor owns another.
#[derive(Clone, Default)]
pub struct FakeDriver {
    inner: Arc<Inner>,
}

impl FakeDriver {
    /// Create an empty fake driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a response for the next dispatched command.
    pub fn push_response(&self, response: FakeResponse) {
        self.inner.script.lock().push_back(response);
    }

    /// Make the next `times` open attempts fail with `code`.
    pub fn fail_opens(&self, code: FaultCode, times: usize) {
        let mut failures = self.inner.open_failures.lock();
        for _ in 0..times {
            failures.push_back(code);
        }
    }

    /// Make the next commit fail with `code`.
    pub fn fail_next_commit(&self, code: FaultCode) {
        self.inner.commit_failures.lock().push_back(code);
    }

    /// Snapshot of every recorded call, in order.
    #[must_use]
    pub fn journal(&self) -> Vec<Event> {
        self.inner.journal.lock().clone()
    }

    /// How many engine-level rollbacks were issued.
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.inner
            .journal
            .lock()
            .iter()
            .filter(|event| matches!(event, Event::RolledBack))
            .count()
    }

    /// How many connections were opened.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner
            .journal
            .lock()
            .iter()
            .filter(|event| matches!(event, Event::Opened))
            .count()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn open(&self, _timeout: Duration) -> Result<Box<dyn DriverConnection>, DriverError> {
        if let Some(code) = self.inner.open_failures.lock().pop_front() {
            self.inner.record(Event::OpenFailed);
            return Err(DriverError::new(code, "scripted open failure"));
        }
        self.inner.record(Event::Opened);
        Ok(Box::new(FakeConnection {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct FakeConnection {
    inner: Arc<Inner>,
}

impl FakeConnection {
    async fn next_response(&self, kind: CommandKind) -> Result<FakeResponse, DriverError> {
        self.inner.record(Event::Dispatched(kind));
        let response = self
            .inner
            .script
            .lock()
            .pop_front()
            .ok_or_else(|| DriverError::invalid_operation(format!("no scripted response for {kind}")))?;
        if matches!(response, FakeResponse::Stall) {
            std::future::pending::<()>().await;
        }
        Ok(response)
    }
}

#[async_trait]
impl DriverConnection for FakeConnection {
    async fn query(&mut self, command: &Command) -> Result<Vec<Row>, DriverError> {
        match self.next_response(command.kind).await? {
            FakeResponse::Rows(rows) => Ok(rows),
            FakeResponse::Fail(code) => Err(DriverError::new(code, "scripted fault")),
            other => Err(DriverError::invalid_operation(format!(
                "script expected a query, got {other:?}"
            ))),
        }
    }

    async fn mutate(&mut self, command: &Command) -> Result<u64, DriverError> {
        match self.next_response(command.kind).await? {
            FakeResponse::Affected(count) => Ok(count),
            FakeResponse::Fail(code) => Err(DriverError::new(code, "scripted fault")),
            other => Err(DriverError::invalid_operation(format!(
                "script expected a mutation, got {other:?}"
            ))),
        }
    }

    async fn upsert(&mut self, command: &Command) -> Result<UpsertOutcome, DriverError> {
        match self.next_response(command.kind).await? {
            FakeResponse::Upsert(outcome) => Ok(outcome),
            FakeResponse::Fail(code) => Err(DriverError::new(code, "scripted fault")),
            other => Err(DriverError::invalid_operation(format!(
                "script expected an upsert, got {other:?}"
            ))),
        }
    }

    async fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DriverError> {
        self.inner.record(Event::Begun(isolation));
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        if let Some(code) = self.inner.commit_failures.lock().pop_front() {
            return Err(DriverError::new(code, "scripted commit failure"));
        }
        self.inner.record(Event::Committed);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.inner.record(Event::RolledBack);
        Ok(())
    }

    async fn savepoint(&mut self, name: &str) -> Result<(), DriverError> {
        self.inner.record(Event::SavepointCreated(name.to_string()));
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DriverError> {
        self.inner.record(Event::RolledBackTo(name.to_string()));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.inner.record(Event::Closed);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_journal_records_calls_in_order() {
        let driver = FakeDriver::new();
        driver.push_response(FakeResponse::Affected(1));

        let mut conn = driver.open(Duration::from_secs(1)).await.unwrap();
        let command = Command::insert("orders").parameter("id", 1i64);
        assert_eq!(conn.mutate(&command).await.unwrap(), 1);
        conn.close().await.unwrap();

        assert_eq!(
            driver.journal(),
            vec![
                Event::Opened,
                Event::Dispatched(CommandKind::Insert),
                Event::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn test_scripted_open_failure() {
        let driver = FakeDriver::new();
        driver.fail_opens(FaultCode::ConnectionRefused, 1);

        let err = driver.open(Duration::from_secs(1)).await.err().unwrap();
        assert_eq!(err.code, FaultCode::ConnectionRefused);
        assert!(driver.open(Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_script_is_a_fault() {
        let driver = FakeDriver::new();
        let mut conn = driver.open(Duration::from_secs(1)).await.unwrap();
        let command = Command::query().target("orders");
        let err = conn.query(&command).await.unwrap_err();
        assert_eq!(err.code, FaultCode::InvalidOperation);
    }
}
