//! Connection and transaction lifecycle state machines.
//!
//! Both machines are closed enums with a pure `transition` function over an
//! explicit legal-transition table. Nothing in this module performs I/O;
//! every stateful component routes its state changes through these functions
//! instead of mutating fields directly, so an illegal lifecycle move is
//! always a rejected transition rather than silent corruption.
//!
//! Same-state transitions are legal no-ops on both machines, with one
//! exception: a disposed connection admits no transition at all, not even to
//! itself.

use thiserror::Error;

/// An illegal state-machine move.
///
/// Always a programming/usage error, never a driver fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid state transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// State the machine was in.
    pub from: &'static str,
    /// State that was requested.
    pub to: &'static str,
}

/// Lifecycle state of one physical connection handle.
///
/// Totally ordered by lifecycle progress. `Broken` is the fault escape
/// hatch, reachable from every non-terminal state; `Disposed` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Nothing is known about the handle yet.
    Unknown = 0,
    /// The handle exists but no open has been attempted.
    Created = 1,
    /// An open is in flight.
    Opening = 2,
    /// The connection is established and idle.
    Open = 3,
    /// A command or engine-level operation is in flight.
    Executing = 4,
    /// A graceful close is in flight.
    Closing = 5,
    /// The connection was closed gracefully.
    Closed = 6,
    /// The connection failed and must not be reused.
    Broken = 7,
    /// The handle has been released; no further transition is possible.
    Disposed = 8,
}

impl ConnectionState {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 9] = [
        Self::Unknown,
        Self::Created,
        Self::Opening,
        Self::Open,
        Self::Executing,
        Self::Closing,
        Self::Closed,
        Self::Broken,
        Self::Disposed,
    ];

    /// Stable short name for logging and diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Created => "created",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Executing => "executing",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Broken => "broken",
            Self::Disposed => "disposed",
        }
    }

    /// Attempt a transition to `target`.
    ///
    /// The legal table:
    ///
    /// | From | To |
    /// |---|---|
    /// | `Unknown` | `Created` |
    /// | `Created` | `Opening` |
    /// | `Opening` | `Open` |
    /// | `Open` | `Executing`, `Closing` |
    /// | `Executing` | `Open` |
    /// | `Closing` | `Closed` |
    /// | any but `Disposed` | same state, `Broken`, `Disposed` |
    ///
    /// Anything else is rejected with [`InvalidTransition`].
    pub fn transition(self, target: Self) -> Result<Self, InvalidTransition> {
        use ConnectionState::{
            Broken, Closed, Closing, Created, Disposed, Executing, Open, Opening, Unknown,
        };

        if self == Disposed {
            return Err(self.rejected(target));
        }

        // Idempotent no-op, fault escape hatch, and disposal are legal from
        // every remaining state.
        if target == self || target == Broken || target == Disposed {
            return Ok(target);
        }

        let legal = matches!(
            (self, target),
            (Unknown, Created)
                | (Created, Opening)
                | (Opening, Open)
                | (Open, Executing)
                | (Open, Closing)
                | (Executing, Open)
                | (Closing, Closed)
        );

        if legal {
            Ok(target)
        } else {
            Err(self.rejected(target))
        }
    }

    fn rejected(self, target: Self) -> InvalidTransition {
        InvalidTransition {
            from: self.name(),
            to: target.name(),
        }
    }
}

/// Lifecycle state of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// The transaction object exists but the engine has not begun it.
    Created,
    /// The transaction is begun and accepting statements.
    Active,
    /// A statement or engine-level control operation is in flight.
    Executing,
    /// A commit is in flight.
    Committing,
    /// The transaction committed; terminal.
    Committed,
    /// A rollback is in flight.
    RollingBack,
    /// The transaction rolled back; terminal.
    RolledBack,
    /// A statement or control operation failed; only rollback or disposal
    /// may follow.
    Faulted,
    /// The transaction's resources have been released; terminal.
    Disposed,
}

impl TransactionState {
    /// All states.
    pub const ALL: [Self; 9] = [
        Self::Created,
        Self::Active,
        Self::Executing,
        Self::Committing,
        Self::Committed,
        Self::RollingBack,
        Self::RolledBack,
        Self::Faulted,
        Self::Disposed,
    ];

    /// Stable short name for logging and diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Executing => "executing",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::RollingBack => "rolling_back",
            Self::RolledBack => "rolled_back",
            Self::Faulted => "faulted",
            Self::Disposed => "disposed",
        }
    }

    /// Whether the transaction has finished (committed, rolled back, or
    /// disposed) and will accept no further work.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Disposed)
    }

    /// Attempt a transition to `target`.
    ///
    /// `Faulted` is reachable from every non-terminal state, `Disposed` from
    /// every state, rollback from every non-terminal state, and same-state
    /// transitions are legal no-ops. `Faulted -> Executing` carries the one
    /// recovery operation a faulted transaction supports: rolling back to a
    /// savepoint, which restores `Active` on success. Ordinary statements
    /// are gated on `Active` by the transaction manager itself.
    pub fn transition(self, target: Self) -> Result<Self, InvalidTransition> {
        use TransactionState::{
            Active, Committed, Committing, Created, Disposed, Executing, Faulted, RolledBack,
            RollingBack,
        };

        if target == self {
            return Ok(self);
        }

        if target == Disposed {
            return Ok(target);
        }

        if target == Faulted && !self.is_terminal() {
            return Ok(target);
        }

        let legal = matches!(
            (self, target),
            (Created, Active)
                | (Active, Executing)
                | (Executing, Active)
                | (Active, Committing)
                | (Committing, Committed)
                | (Created, RollingBack)
                | (Active, RollingBack)
                | (Executing, RollingBack)
                | (Committing, RollingBack)
                | (Faulted, RollingBack)
                | (Faulted, Executing)
                | (RollingBack, RolledBack)
        );

        if legal {
            Ok(target)
        } else {
            Err(InvalidTransition {
                from: self.name(),
                to: target.name(),
            })
        }
    }
}
