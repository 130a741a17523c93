//! Transaction manager with savepoint support.
//!
//! A [`Transaction`] exclusively owns one connection and one engine-level
//! transaction for its whole lifetime. Statements inside it are never
//! retried: a failed statement may already have visible side effects within
//! the transaction, so the fault is surfaced and the transaction moves to
//! `Faulted`, leaving the caller to roll back.
//!
//! A transaction instance is single-owner, single-writer: exactly one
//! logical caller drives it at a time. Concurrent calls against the same
//! instance are a usage error, not a supported scenario.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use steadydb_command::{validate_identifier, Command};
use steadydb_driver::{Driver, IsolationLevel};

use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::executor::Outcome;
use crate::lease::Lease;
use crate::state::TransactionState;

/// Handle to a created savepoint.
#[derive(Debug, Clone)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    /// The caller-chosen savepoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An entry on the savepoint stack: caller-chosen name plus the internal
/// identifier actually sent to the engine.
#[derive(Debug, Clone)]
struct SavepointEntry {
    name: String,
    internal_id: String,
}

/// A unit of work with exclusive ownership of one connection.
///
/// Statements execute in submission order. Rolling back to a savepoint
/// discards that savepoint and every savepoint created after it, preserving
/// everything created before. Dropping a still-active transaction triggers a
/// best-effort rollback; call [`dispose`](Transaction::dispose) for
/// deterministic cleanup.
pub struct Transaction {
    lease: Option<Lease>,
    state: TransactionState,
    savepoints: Vec<SavepointEntry>,
    isolation: IsolationLevel,
    command_timeout: Duration,
}

impl Transaction {
    /// Begin a transaction: acquire a connection and start an engine-level
    /// transaction at `isolation`.
    ///
    /// On failure nothing is leaked and no transaction object exists.
    pub(crate) async fn begin(
        driver: &dyn Driver,
        config: &ExecutorConfig,
        isolation: IsolationLevel,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut lease = Lease::open(driver, timeout.unwrap_or(config.connect_timeout)).await?;

        match lease.begin(isolation).await {
            Ok(()) => {
                let state = TransactionState::Created.transition(TransactionState::Active)?;
                tracing::debug!(isolation = isolation.name(), "transaction started");
                Ok(Self {
                    lease: Some(lease),
                    state,
                    savepoints: Vec::new(),
                    isolation,
                    command_timeout: config.command_timeout,
                })
            }
            Err(err) => {
                lease.dispose().await;
                Err(err)
            }
        }
    }

    /// Current transaction state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// The isolation level this transaction was begun at.
    #[must_use]
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    /// Names currently on the savepoint stack, oldest first.
    pub fn savepoint_names(&self) -> impl Iterator<Item = &str> {
        self.savepoints.iter().map(|entry| entry.name.as_str())
    }

    /// Statements and new savepoints are only legal while `Active`; a
    /// faulted transaction must recover via savepoint rollback first.
    fn require_active(&self) -> Result<()> {
        if self.state == TransactionState::Active {
            Ok(())
        } else {
            Err(Error::InvalidStateTransition(
                crate::state::InvalidTransition {
                    from: self.state.name(),
                    to: TransactionState::Executing.name(),
                },
            ))
        }
    }

    /// Execute a command inside the transaction.
    ///
    /// Legal only while `Active`. The statement is **not** retried on
    /// transient faults; any fault moves the transaction to `Faulted` and is
    /// surfaced as [`Error::Transaction`]. Cancellation mid-statement also
    /// faults the transaction (the connection's condition is indeterminate)
    /// but does not roll it back.
    pub async fn execute(&mut self, command: &Command, cancel: &CancellationToken) -> Result<Outcome> {
        command.validate()?;
        self.require_active()?;
        self.state = self.state.transition(TransactionState::Executing)?;

        if cancel.is_cancelled() {
            self.state = self.state.transition(TransactionState::Active)?;
            return Err(Error::Cancelled);
        }

        let timeout = command.timeout.unwrap_or(self.command_timeout);
        let lease = match self.lease.as_mut() {
            Some(lease) => lease,
            None => return Err(Error::InvalidStateTransition(
                crate::state::InvalidTransition {
                    from: "disposed",
                    to: "executing",
                },
            )),
        };

        let result = tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = lease.dispatch(command, timeout) => result,
        };

        match result {
            Ok(outcome) => {
                self.state = self.state.transition(TransactionState::Active)?;
                Ok(outcome)
            }
            Err(Error::Transient(fault)) | Err(Error::Permanent(fault)) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                tracing::debug!(code = %fault.code, "statement failed, transaction faulted");
                Err(Error::Transaction { source: fault })
            }
            Err(Error::Cancelled) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                tracing::debug!("statement cancelled mid-flight, transaction faulted");
                Err(Error::Cancelled)
            }
            Err(other) => Err(other),
        }
    }

    /// Create a named savepoint.
    ///
    /// Legal only while `Active`; fails if `name` is already on the stack.
    /// Cancellation before the engine call leaves the transaction `Active`;
    /// mid-flight cancellation faults it.
    pub async fn create_savepoint(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Savepoint> {
        validate_identifier(name)?;
        self.require_active()?;

        if self.savepoints.iter().any(|entry| entry.name == name) {
            return Err(Error::SavepointExists(name.to_string()));
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.state = self.state.transition(TransactionState::Executing)?;
        let internal_id = format!("sp_{}", Uuid::new_v4().simple());
        let lease = match self.lease.as_mut() {
            Some(lease) => lease,
            None => {
                return Err(Error::InvalidStateTransition(
                    crate::state::InvalidTransition {
                        from: "disposed",
                        to: "executing",
                    },
                ))
            }
        };

        let result = tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = lease.savepoint(&internal_id) => result,
        };

        match result {
            Ok(()) => {
                self.state = self.state.transition(TransactionState::Active)?;
                self.savepoints.push(SavepointEntry {
                    name: name.to_string(),
                    internal_id,
                });
                tracing::debug!(name, depth = self.savepoints.len(), "savepoint created");
                Ok(Savepoint {
                    name: name.to_string(),
                })
            }
            Err(Error::Transient(fault)) | Err(Error::Permanent(fault)) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                Err(Error::Transaction { source: fault })
            }
            Err(Error::Cancelled) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                tracing::debug!("savepoint creation cancelled mid-flight, transaction faulted");
                Err(Error::Cancelled)
            }
            Err(other) => Err(other),
        }
    }

    /// Roll back to a named savepoint.
    ///
    /// On success, `name` and every savepoint created after it are removed
    /// from the stack; everything created before it is preserved. This is
    /// also the one recovery path out of `Faulted`: rolling a faulted
    /// transaction back to a savepoint restores it to `Active`.
    pub async fn rollback_to_savepoint(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(index) = self.savepoints.iter().position(|entry| entry.name == name) else {
            return Err(Error::UnknownSavepoint(name.to_string()));
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.state = self.state.transition(TransactionState::Executing)?;

        let internal_id = self.savepoints[index].internal_id.clone();
        let lease = match self.lease.as_mut() {
            Some(lease) => lease,
            None => {
                return Err(Error::InvalidStateTransition(
                    crate::state::InvalidTransition {
                        from: "disposed",
                        to: "executing",
                    },
                ))
            }
        };

        let result = tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = lease.rollback_to(&internal_id) => result,
        };

        match result {
            Ok(()) => {
                self.state = self.state.transition(TransactionState::Active)?;
                // Strict suffix removal: the target savepoint and everything
                // pushed after it.
                self.savepoints.truncate(index);
                tracing::debug!(name, depth = self.savepoints.len(), "rolled back to savepoint");
                Ok(())
            }
            Err(Error::Transient(fault)) | Err(Error::Permanent(fault)) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                Err(Error::Transaction { source: fault })
            }
            Err(Error::Cancelled) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                tracing::debug!("savepoint rollback cancelled mid-flight, transaction faulted");
                Err(Error::Cancelled)
            }
            Err(other) => Err(other),
        }
    }

    /// Commit the transaction.
    ///
    /// Legal only from `Active`. A commit failure moves the transaction to
    /// `Faulted` and surfaces the fault, never swallowing it. Cancellation
    /// before the engine call leaves the transaction `Active`; mid-flight
    /// cancellation faults it (the commit may or may not have landed).
    pub async fn commit(&mut self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.state = self.state.transition(TransactionState::Committing)?;

        let lease = match self.lease.as_mut() {
            Some(lease) => lease,
            None => {
                return Err(Error::InvalidStateTransition(
                    crate::state::InvalidTransition {
                        from: "disposed",
                        to: "committing",
                    },
                ))
            }
        };

        let result = tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = lease.commit() => result,
        };

        match result {
            Ok(()) => {
                self.state = self.state.transition(TransactionState::Committed)?;
                self.savepoints.clear();
                tracing::debug!("transaction committed");
                Ok(())
            }
            Err(Error::Transient(fault)) | Err(Error::Permanent(fault)) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                tracing::warn!(code = %fault.code, "commit failed, transaction faulted");
                Err(Error::Transaction { source: fault })
            }
            Err(Error::Cancelled) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                tracing::warn!("commit cancelled mid-flight, transaction faulted");
                Err(Error::Cancelled)
            }
            Err(other) => Err(other),
        }
    }

    /// Roll back the transaction.
    ///
    /// Legal from any non-terminal state. Requesting rollback on a
    /// transaction that is already `Committed`, `RolledBack`, or `Disposed`
    /// succeeds as a no-op so cleanup paths never double-fault. The implicit
    /// rollback issued by [`dispose`](Transaction::dispose) is not
    /// cancellable.
    pub async fn rollback(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.state.is_terminal() {
            tracing::debug!(state = self.state.name(), "rollback on finished transaction, no-op");
            return Ok(());
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.state = self.state.transition(TransactionState::RollingBack)?;

        let lease = match self.lease.as_mut() {
            Some(lease) => lease,
            None => {
                self.state = self.state.transition(TransactionState::RolledBack)?;
                return Ok(());
            }
        };

        if lease.is_broken() {
            // The engine aborts the transaction when the connection drops;
            // there is nothing left to deliver a ROLLBACK on.
            self.state = self.state.transition(TransactionState::RolledBack)?;
            self.savepoints.clear();
            tracing::debug!("connection broken, rollback implied by disposal");
            return Ok(());
        }

        let result = tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = lease.rollback() => result,
        };

        match result {
            Ok(()) => {
                self.state = self.state.transition(TransactionState::RolledBack)?;
                self.savepoints.clear();
                tracing::debug!("transaction rolled back");
                Ok(())
            }
            Err(Error::Transient(fault)) | Err(Error::Permanent(fault)) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                tracing::warn!(code = %fault.code, "rollback failed, transaction faulted");
                Err(Error::Transaction { source: fault })
            }
            Err(Error::Cancelled) => {
                self.state = self.state.transition(TransactionState::Faulted)?;
                tracing::warn!("rollback cancelled mid-flight, transaction faulted");
                Err(Error::Cancelled)
            }
            Err(other) => Err(other),
        }
    }

    /// Release the transaction's resources.
    ///
    /// If the transaction is still open, an implicit rollback is issued
    /// first so it can never leave the connection in an indeterminate state.
    /// Disposal-time faults are logged but never prevent reaching
    /// `Disposed`. Idempotent.
    pub async fn dispose(&mut self) {
        if self.state == TransactionState::Disposed {
            return;
        }

        if !self.state.is_terminal() {
            // The implicit rollback must run to completion; a fresh token
            // keeps it out of reach of the caller's cancellation.
            if let Err(err) = self.rollback(&CancellationToken::new()).await {
                tracing::warn!(error = %err, "implicit rollback during dispose failed");
            }
        }

        self.savepoints.clear();
        match self.state.transition(TransactionState::Disposed) {
            Ok(next) => self.state = next,
            Err(err) => tracing::warn!(error = %err, "disposal transition rejected"),
        }

        if let Some(mut lease) = self.lease.take() {
            lease.dispose().await;
        }
        tracing::debug!("transaction disposed");
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Disposed {
            return;
        }

        let Some(mut lease) = self.lease.take() else {
            return;
        };

        if self.state.is_terminal() {
            // Committed or rolled back: only the connection handle remains.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { lease.dispose().await });
            }
            return;
        }

        tracing::warn!(
            state = self.state.name(),
            "transaction dropped while open, issuing best-effort rollback"
        );
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if !lease.is_broken() {
                    if let Err(err) = lease.rollback().await {
                        tracing::warn!(error = %err, "rollback after drop failed");
                    }
                }
                lease.dispose().await;
            });
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .field("isolation", &self.isolation)
            .field("savepoints", &self.savepoints.len())
            .finish_non_exhaustive()
    }
}
