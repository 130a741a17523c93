//! Fault classification.
//!
//! A fixed allow-list decides which driver fault codes are worth retrying.
//! Everything outside the list is permanent: no retry budget, however
//! generous, ever re-runs a constraint violation or a syntax error.

use steadydb_driver::{DriverError, FaultCode};

use crate::error::Error;

/// Fault codes expected to resolve on retry.
pub const TRANSIENT_FAULTS: &[FaultCode] = &[
    FaultCode::Timeout,
    FaultCode::ConnectionReset,
    FaultCode::ConnectionRefused,
    FaultCode::NetworkUnreachable,
    FaultCode::DeadlockVictim,
    FaultCode::Throttled,
    FaultCode::ServerBusy,
];

/// Fault codes after which the physical connection can no longer be
/// trusted.
///
/// Orthogonal to transience: a deadlock victim is transient but leaves the
/// connection healthy, while a protocol violation is permanent and severs
/// it.
pub const SEVERING_FAULTS: &[FaultCode] = &[
    FaultCode::Timeout,
    FaultCode::ConnectionReset,
    FaultCode::ConnectionRefused,
    FaultCode::NetworkUnreachable,
    FaultCode::ProtocolViolation,
];

/// Whether a driver fault is transient (worth retrying).
#[must_use]
pub fn is_transient(fault: &DriverError) -> bool {
    TRANSIENT_FAULTS.contains(&fault.code)
}

/// Whether a driver fault leaves the connection unusable.
#[must_use]
pub fn severs_connection(fault: &DriverError) -> bool {
    SEVERING_FAULTS.contains(&fault.code)
}

/// Wrap a driver fault in its classified execution-layer kind.
#[must_use]
pub fn classify(fault: DriverError) -> Error {
    if is_transient(&fault) {
        Error::Transient(fault)
    } else {
        Error::Permanent(fault)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes() {
        for code in [
            FaultCode::Timeout,
            FaultCode::ConnectionReset,
            FaultCode::DeadlockVictim,
            FaultCode::Throttled,
        ] {
            assert!(is_transient(&DriverError::new(code, "x")), "{code}");
        }
    }

    #[test]
    fn test_permanent_codes() {
        for code in [
            FaultCode::ConstraintViolation,
            FaultCode::DuplicateKey,
            FaultCode::SyntaxError,
            FaultCode::PermissionDenied,
            FaultCode::InvalidOperation,
            FaultCode::ProtocolViolation,
            FaultCode::Other,
        ] {
            assert!(!is_transient(&DriverError::new(code, "x")), "{code}");
        }
    }

    #[test]
    fn test_severing_is_orthogonal_to_transience() {
        // Transient but the connection survives.
        let deadlock = DriverError::new(FaultCode::DeadlockVictim, "x");
        assert!(is_transient(&deadlock));
        assert!(!severs_connection(&deadlock));

        // Permanent and the connection is gone.
        let protocol = DriverError::new(FaultCode::ProtocolViolation, "x");
        assert!(!is_transient(&protocol));
        assert!(severs_connection(&protocol));

        // Statement-level faults leave the connection healthy.
        assert!(!severs_connection(&DriverError::new(
            FaultCode::ConstraintViolation,
            "x"
        )));
    }

    #[test]
    fn test_classify_wraps_by_kind() {
        assert!(matches!(
            classify(DriverError::timeout("slow")),
            Error::Transient(_)
        ));
        assert!(matches!(
            classify(DriverError::new(FaultCode::SyntaxError, "bad")),
            Error::Permanent(_)
        ));
    }
}
