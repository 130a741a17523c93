//! Scoped connection lease with lifecycle tracking.
//!
//! A [`Lease`] owns one physical connection for one scope (a single attempt,
//! or a whole transaction) and routes every lifecycle change through the
//! [`ConnectionState`] machine. The handle is released exactly once per
//! acquisition regardless of exit path.

use std::time::Duration;

use steadydb_command::{Command, CommandKind};
use steadydb_driver::{Driver, DriverConnection, DriverError, IsolationLevel};

use crate::classify;
use crate::error::{Error, Result};
use crate::executor::Outcome;
use crate::state::ConnectionState;

/// One leased connection plus its tracked lifecycle state.
pub(crate) struct Lease {
    conn: Option<Box<dyn DriverConnection>>,
    state: ConnectionState,
}

impl Lease {
    /// Acquire a connection from the driver.
    ///
    /// Walks `Created -> Opening -> Open`. On failure nothing is leased and
    /// the classified fault is returned.
    pub(crate) async fn open(driver: &dyn Driver, timeout: Duration) -> Result<Self> {
        let state = ConnectionState::Created.transition(ConnectionState::Opening)?;

        match driver.open(timeout).await {
            Ok(conn) => {
                let state = state.transition(ConnectionState::Open)?;
                tracing::trace!("connection leased");
                Ok(Self {
                    conn: Some(conn),
                    state,
                })
            }
            Err(fault) => {
                tracing::debug!(code = %fault.code, "connection acquisition failed");
                Err(classify::classify(fault))
            }
        }
    }

    /// Dispatch a command by kind under `timeout`.
    pub(crate) async fn dispatch(&mut self, command: &Command, timeout: Duration) -> Result<Outcome> {
        self.state = self.state.transition(ConnectionState::Executing)?;

        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(released()),
        };

        let operation = async {
            match command.kind {
                CommandKind::Query => conn.query(command).await.map(Outcome::Rows),
                CommandKind::Insert | CommandKind::Update | CommandKind::Delete => {
                    conn.mutate(command).await.map(Outcome::Affected)
                }
                CommandKind::Upsert => conn.upsert(command).await.map(Outcome::Upsert),
            }
        };

        let result = match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::timeout(format!(
                "{} command exceeded {timeout:?}",
                command.kind
            ))),
        };

        self.settle(result)
    }

    /// Begin an engine-level transaction.
    pub(crate) async fn begin(&mut self, isolation: IsolationLevel) -> Result<()> {
        self.state = self.state.transition(ConnectionState::Executing)?;
        let result = match self.conn.as_mut() {
            Some(conn) => conn.begin(isolation).await,
            None => return Err(released()),
        };
        self.settle(result)
    }

    /// Commit the engine-level transaction.
    pub(crate) async fn commit(&mut self) -> Result<()> {
        self.state = self.state.transition(ConnectionState::Executing)?;
        let result = match self.conn.as_mut() {
            Some(conn) => conn.commit().await,
            None => return Err(released()),
        };
        self.settle(result)
    }

    /// Roll back the engine-level transaction.
    pub(crate) async fn rollback(&mut self) -> Result<()> {
        self.state = self.state.transition(ConnectionState::Executing)?;
        let result = match self.conn.as_mut() {
            Some(conn) => conn.rollback().await,
            None => return Err(released()),
        };
        self.settle(result)
    }

    /// Create an engine-level savepoint.
    pub(crate) async fn savepoint(&mut self, name: &str) -> Result<()> {
        self.state = self.state.transition(ConnectionState::Executing)?;
        let result = match self.conn.as_mut() {
            Some(conn) => conn.savepoint(name).await,
            None => return Err(released()),
        };
        self.settle(result)
    }

    /// Roll back to an engine-level savepoint.
    pub(crate) async fn rollback_to(&mut self, name: &str) -> Result<()> {
        self.state = self.state.transition(ConnectionState::Executing)?;
        let result = match self.conn.as_mut() {
            Some(conn) => conn.rollback_to_savepoint(name).await,
            None => return Err(released()),
        };
        self.settle(result)
    }

    /// Release the lease.
    ///
    /// Closes gracefully when the connection is still healthy, then walks to
    /// `Disposed` and drops the handle. Infallible: disposal-time faults are
    /// logged, never surfaced, and never prevent disposal.
    pub(crate) async fn dispose(&mut self) {
        if self.state == ConnectionState::Open {
            if let Err(err) = self.close().await {
                tracing::warn!(error = %err, "graceful close during disposal failed");
            }
        }

        if self.state != ConnectionState::Disposed {
            match self.state.transition(ConnectionState::Disposed) {
                Ok(next) => self.state = next,
                Err(err) => tracing::warn!(error = %err, "disposal transition rejected"),
            }
        }

        if self.conn.take().is_some() {
            tracing::trace!("connection handle released");
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.state = self.state.transition(ConnectionState::Closing)?;
        let result = match self.conn.as_mut() {
            Some(conn) => conn.close().await,
            None => return Err(released()),
        };
        match result {
            Ok(()) => {
                self.state = self.state.transition(ConnectionState::Closed)?;
                Ok(())
            }
            Err(fault) => {
                self.state = self.state.transition(ConnectionState::Broken)?;
                Err(classify::classify(fault))
            }
        }
    }

    /// Whether the connection has been marked unusable.
    pub(crate) fn is_broken(&self) -> bool {
        self.state == ConnectionState::Broken
    }

    /// Record the outcome of an in-flight engine operation.
    ///
    /// Back to `Open` on success. On failure the fault is classified; only a
    /// severing fault marks the connection `Broken`, a statement-level fault
    /// (constraint violation, deadlock victim) leaves it usable.
    fn settle<T>(&mut self, result: std::result::Result<T, DriverError>) -> Result<T> {
        match result {
            Ok(value) => {
                self.state = self.state.transition(ConnectionState::Open)?;
                Ok(value)
            }
            Err(fault) => {
                if classify::severs_connection(&fault) {
                    self.state = self.state.transition(ConnectionState::Broken)?;
                    tracing::debug!(code = %fault.code, "connection marked broken");
                } else {
                    self.state = self.state.transition(ConnectionState::Open)?;
                }
                Err(classify::classify(fault))
            }
        }
    }
}

fn released() -> Error {
    Error::Permanent(DriverError::invalid_operation(
        "connection handle already released",
    ))
}

impl Drop for Lease {
    fn drop(&mut self) {
        // Deterministic release goes through `dispose`; this is the backstop
        // for futures dropped mid-flight (cancellation, panics).
        if self.conn.is_some() {
            tracing::trace!(state = self.state.name(), "lease dropped, releasing connection handle");
        }
    }
}
