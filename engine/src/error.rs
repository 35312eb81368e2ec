//! Shared error taxonomy (spec section 7). Each subsystem defines its own
//! `thiserror` enum but tags every variant with one of these kinds so the
//! stage controller can decide retry/fail/suspend without downcasting.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, unknown schema, invalid address. Surfaced
    /// synchronously; never retried.
    InputRejection,
    /// Input state already spent or locked by another transaction.
    /// Recovered locally by the Assemble stage.
    StateConflict,
    /// An endorser replied with a revert reason. Terminal `Failed`.
    EndorsementRejected,
    /// Peer unreachable or timed out. Retried with backoff indefinitely.
    TransientPeer,
    /// Base-ledger RPC failure or pending-too-long. Triggers resubmission.
    TransientLedger,
    /// Receipt shows revert. Final.
    LedgerRevert,
    /// DB corruption, invariant violation, plugin crash. Orchestrator stops.
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InputRejection => "InputRejection",
            ErrorKind::StateConflict => "StateConflict",
            ErrorKind::EndorsementRejected => "EndorsementRejected",
            ErrorKind::TransientPeer => "TransientPeer",
            ErrorKind::TransientLedger => "TransientLedger",
            ErrorKind::LedgerRevert => "LedgerRevert",
            ErrorKind::Fatal => "Fatal",
        };
        write!(f, "{s}")
    }
}

/// Implemented by every subsystem error enum so callers across module
/// boundaries (chiefly the stage controller) can classify failures
/// uniformly.
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientPeer | ErrorKind::TransientLedger | ErrorKind::StateConflict
        )
    }
}
