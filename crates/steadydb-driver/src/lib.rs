//! # steadydb-driver
//!
//! Driver boundary for the steadydb execution layer.
//!
//! The execution layer never talks to a database directly: it consumes an
//! implementation of the [`Driver`] and [`DriverConnection`] traits defined
//! here. A driver can open and close one physical connection, carry abstract
//! commands to the engine, and start/commit/rollback engine-level
//! transactions including named savepoints.
//!
//! Driver faults carry a classifiable [`FaultCode`] so the execution layer
//! can decide whether a failure is worth retrying. The driver reports *what*
//! happened; the execution layer decides *what to do about it*.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod conn;
pub mod error;
pub mod fault;
pub mod isolation;

pub use conn::{Driver, DriverConnection, UpsertOutcome};
pub use error::DriverError;
pub use fault::FaultCode;
pub use isolation::IsolationLevel;
