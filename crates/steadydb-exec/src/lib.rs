//! # steadydb-exec
//!
//! Resilient, transactional execution layer between application code and a
//! relational database driver.
//!
//! ## Features
//!
//! - **Tracked connection lifecycle**: every physical connection moves
//!   through an explicit, table-driven state machine; illegal moves are
//!   rejected, never silently absorbed
//! - **Classified retries**: transient driver faults (timeouts, resets,
//!   deadlock victims, throttling) are retried with exponential backoff and
//!   jitter; permanent faults surface after exactly one attempt
//! - **Transactions with savepoints**: one exclusively-owned connection per
//!   unit of work, nested rollback points with strict-suffix semantics, and
//!   idempotent rollback for cleanup paths
//! - **Cancellation-aware**: every operation accepts a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken); cancelling
//!   during a retry delay aborts before the next attempt starts
//!
//! ## Example
//!
//! ```rust,ignore
//! use steadydb_exec::{Executor, ExecutorConfig, IsolationLevel, RetryPolicy};
//! use steadydb_command::Command;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ExecutorConfig::new().retry(RetryPolicy::new(3).exponential_backoff(true));
//! let executor = Executor::new(driver, config)?;
//! let cancel = CancellationToken::new();
//!
//! // Single-shot command, retried on transient faults.
//! let count = executor
//!     .execute_returning_count(&Command::insert("orders").parameter("total", 10i64), &cancel)
//!     .await?;
//!
//! // Unit of work with a savepoint.
//! let mut tx = executor
//!     .begin_transaction(IsolationLevel::ReadCommitted, None, &cancel)
//!     .await?;
//! tx.execute(&Command::insert("orders").parameter("total", 10i64), &cancel).await?;
//! let sp = tx.create_savepoint("before_update", &cancel).await?;
//! if tx.execute(&Command::update("orders").parameter("total", 12i64), &cancel).await.is_err() {
//!     tx.rollback_to_savepoint(sp.name(), &cancel).await?;
//! }
//! tx.commit(&cancel).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod classify;
pub mod config;
pub mod error;
pub mod executor;
pub mod retry;
pub mod state;
pub mod transaction;

mod lease;

// Re-export commonly used types
pub use config::ExecutorConfig;
pub use error::{Error, Result};
pub use executor::{Executed, Executor, Outcome};
pub use retry::RetryPolicy;
pub use state::{ConnectionState, InvalidTransition, TransactionState};
pub use steadydb_command::{Command, CommandKind, FromValue, Row, Value};
pub use steadydb_driver::{Driver, DriverError, FaultCode, IsolationLevel, UpsertOutcome};
pub use transaction::{Savepoint, Transaction};
