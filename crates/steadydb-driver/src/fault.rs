//! Classifiable driver fault codes.

/// The closed set of fault codes a driver can report.
///
/// Drivers map their engine-specific error numbers onto these codes; the
/// execution layer's classifier decides which of them are transient. The set
/// is closed so that classification is a total lookup; anything a driver
/// cannot map lands on [`Other`].
///
/// [`Other`]: FaultCode::Other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    /// The operation did not complete within its time budget.
    Timeout,
    /// The connection was reset by the peer.
    ConnectionReset,
    /// The server refused the connection.
    ConnectionRefused,
    /// The network path to the server is unavailable.
    NetworkUnreachable,
    /// The statement was chosen as a deadlock victim.
    DeadlockVictim,
    /// The server is shedding load (throttling).
    Throttled,
    /// The server is temporarily too busy to accept work.
    ServerBusy,
    /// A uniqueness, foreign-key, or check constraint was violated.
    ConstraintViolation,
    /// A duplicate key was rejected.
    DuplicateKey,
    /// The engine rejected the statement as malformed.
    SyntaxError,
    /// The principal lacks permission for the operation.
    PermissionDenied,
    /// The operation is not valid in the connection's current condition.
    InvalidOperation,
    /// The driver and engine disagreed at the wire level.
    ProtocolViolation,
    /// Anything the driver could not map onto a known code.
    Other,
}

impl FaultCode {
    /// Stable short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionReset => "connection_reset",
            Self::ConnectionRefused => "connection_refused",
            Self::NetworkUnreachable => "network_unreachable",
            Self::DeadlockVictim => "deadlock_victim",
            Self::Throttled => "throttled",
            Self::ServerBusy => "server_busy",
            Self::ConstraintViolation => "constraint_violation",
            Self::DuplicateKey => "duplicate_key",
            Self::SyntaxError => "syntax_error",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidOperation => "invalid_operation",
            Self::ProtocolViolation => "protocol_violation",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
