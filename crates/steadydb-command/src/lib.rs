//! # steadydb-command
//!
//! Abstract data-access command model for the steadydb execution layer.
//!
//! A [`Command`] describes *what* the caller wants done (query, insert,
//! update, delete, upsert) without committing to any SQL dialect. The
//! execution layer decides *how reliably* the command is carried out; the
//! driver decides what wire traffic it becomes.
//!
//! Commands are validated before they are handed to a driver, so malformed
//! shapes fail fast without touching a connection.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod command;
pub mod error;
pub mod row;
pub mod value;

pub use command::{validate_identifier, Command, CommandKind};
pub use error::{TypeError, ValidationError};
pub use row::{Column, Row};
pub use value::{FromValue, Value};
