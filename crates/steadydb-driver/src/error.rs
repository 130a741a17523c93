//! Driver-level error type.

use thiserror::Error;

use crate::fault::FaultCode;

/// A fault raised by a driver.
///
/// Every driver fault carries a [`FaultCode`] the execution layer can
/// classify, plus a human-readable message for logs and surfaced errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct DriverError {
    /// Classifiable fault code.
    pub code: FaultCode,
    /// Driver-provided description of the fault.
    pub message: String,
}

impl DriverError {
    /// Create a driver error from a code and message.
    pub fn new(code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Convenience constructor for timeouts.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FaultCode::Timeout, message)
    }

    /// Convenience constructor for invalid-operation faults.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(FaultCode::InvalidOperation, message)
    }

    /// The fault code.
    #[must_use]
    pub fn code(&self) -> FaultCode {
        self.code
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_message() {
        let err = DriverError::new(FaultCode::DeadlockVictim, "chosen as victim");
        assert_eq!(err.to_string(), "deadlock_victim: chosen as victim");
    }
}
