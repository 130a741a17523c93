//! Retrying command executor.
//!
//! Single-shot commands funnel through [`Executor::execute`]: validate,
//! acquire a fresh connection, dispatch by kind, classify any fault, and
//! either retry after a policy-computed delay or surface the result. Every
//! attempt is a fully independent acquisition; no state leaks between
//! attempts.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use steadydb_command::{Command, FromValue, Row};
use steadydb_driver::{Driver, IsolationLevel, UpsertOutcome};

use crate::config::ExecutorConfig;
use crate::error::{Error, Result};
use crate::lease::Lease;
use crate::retry::RetryPolicy;
use crate::transaction::Transaction;

/// Result payload of a dispatched command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rows returned by a query.
    Rows(Vec<Row>),
    /// Affected-row count from an insert/update/delete.
    Affected(u64),
    /// Server-side decision from an upsert.
    Upsert(UpsertOutcome),
}

/// A completed command, with the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    /// The command's result payload.
    pub outcome: Outcome,
    /// Total attempts made, including the first.
    pub attempts: u32,
}

/// Resilient single-shot command executor.
///
/// Cheap to clone via the shared driver handle; one executor serves many
/// concurrent callers. Transactions begun from it own their connection
/// exclusively and bypass the retry machinery entirely.
pub struct Executor {
    driver: Arc<dyn Driver>,
    config: ExecutorConfig,
    policy: RetryPolicy,
}

impl Executor {
    /// Create an executor over a driver.
    pub fn new(driver: Arc<dyn Driver>, config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let policy = config.effective_retry();
        tracing::debug!(
            app = %config.application_name,
            max_retries = policy.max_retries,
            backoff = policy.exponential_backoff,
            "executor created"
        );
        Ok(Self {
            driver,
            config,
            policy,
        })
    }

    /// The executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a command with automatic recovery from transient faults.
    ///
    /// Validation failures short-circuit before any connection is acquired.
    /// Transient faults are retried up to the policy budget with a jittered
    /// delay between attempts; permanent faults surface after exactly one
    /// attempt. Cancellation aborts during the retry delay (before the next
    /// attempt starts) or mid-statement, in which case it surfaces as
    /// [`Error::Cancelled`] rather than a partial result.
    pub async fn execute(&self, command: &Command, cancel: &CancellationToken) -> Result<Executed> {
        command.validate()?;

        let mut attempt: u32 = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let result = tokio::select! {
                () = cancel.cancelled() => Err(Error::Cancelled),
                result = self.attempt_once(command) => result,
            };

            match result {
                Ok(outcome) => {
                    tracing::debug!(kind = %command.kind, attempts = attempt, "command completed");
                    return Ok(Executed {
                        outcome,
                        attempts: attempt,
                    });
                }
                Err(Error::Transient(fault)) => {
                    if !self.policy.allows_retry(attempt) {
                        tracing::warn!(
                            kind = %command.kind,
                            attempts = attempt,
                            code = %fault.code,
                            "retry budget exhausted"
                        );
                        return Err(Error::RetryExhausted {
                            attempts: attempt,
                            source: fault,
                        });
                    }

                    let delay = self.policy.next_delay(attempt);
                    tracing::debug!(
                        kind = %command.kind,
                        attempt,
                        code = %fault.code,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient fault, retrying"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(Error::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// One fully independent attempt: fresh connection, dispatch, release.
    async fn attempt_once(&self, command: &Command) -> Result<Outcome> {
        let mut lease = Lease::open(self.driver.as_ref(), self.config.connect_timeout).await?;
        let timeout = command.timeout.unwrap_or(self.config.command_timeout);
        let result = lease.dispatch(command, timeout).await;
        lease.dispose().await;
        result
    }

    /// Execute a query and return its full row set.
    pub async fn query(&self, command: &Command, cancel: &CancellationToken) -> Result<Vec<Row>> {
        match self.execute(command, cancel).await?.outcome {
            Outcome::Rows(rows) => Ok(rows),
            other => Err(shape_mismatch("rows", &other)),
        }
    }

    /// Execute a query expected to match at most one row.
    ///
    /// Zero matching rows yield `Ok(None)`, not a fault.
    pub async fn query_row(
        &self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<Option<Row>> {
        Ok(self.query(command, cancel).await?.into_iter().next())
    }

    /// Execute a query expected to produce a single scalar value.
    ///
    /// The first column of the first row is converted; zero rows or a NULL
    /// scalar yield `Ok(None)`.
    pub async fn query_scalar<T: FromValue>(
        &self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        match self.query_row(command, cancel).await? {
            Some(row) => match row.get_raw(0) {
                Some(value) => Ok(T::from_value_nullable(value)?),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Execute an insert/update/delete and return the affected-row count.
    pub async fn execute_returning_count(
        &self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        match self.execute(command, cancel).await?.outcome {
            Outcome::Affected(count) => Ok(count),
            other => Err(shape_mismatch("affected-row count", &other)),
        }
    }

    /// Execute an upsert and return the server-side outcome.
    pub async fn execute_upsert(
        &self,
        command: &Command,
        cancel: &CancellationToken,
    ) -> Result<UpsertOutcome> {
        match self.execute(command, cancel).await?.outcome {
            Outcome::Upsert(outcome) => Ok(outcome),
            other => Err(shape_mismatch("upsert outcome", &other)),
        }
    }

    /// Begin a transaction at the requested isolation level.
    ///
    /// The transaction exclusively owns one connection until commit,
    /// rollback, or disposal. `timeout` bounds connection acquisition and
    /// defaults to the configured connect timeout. A failure here leaves no
    /// transaction object behind.
    pub async fn begin_transaction(
        &self,
        isolation: IsolationLevel,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Transaction> {
        Transaction::begin(
            self.driver.as_ref(),
            &self.config,
            isolation,
            timeout,
            cancel,
        )
        .await
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("application_name", &self.config.application_name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn shape_mismatch(expected: &str, actual: &Outcome) -> Error {
    let actual = match actual {
        Outcome::Rows(_) => "rows",
        Outcome::Affected(_) => "affected-row count",
        Outcome::Upsert(_) => "upsert outcome",
    };
    Error::Permanent(steadydb_driver::DriverError::invalid_operation(format!(
        "expected {expected}, command produced {actual}"
    )))
}
