//! Settlement Module - All-or-Nothing Batch Submission
//!
//! Sends a whole wager batch to the settlement collaborator and interprets
//! the single structured answer.
//!
//! ## Flow:
//! 1. Reject an empty batch without touching the network
//! 2. Refresh the balance and check the batch total against it
//! 3. Send every draft in one request, tagged with the batch's idempotency key
//! 4. Accepted: clear the batch. Anything else: leave it exactly as it was
//! 5. Publish the outcome and reconcile the balance either way
//!
//! ## Guarantees:
//! - One submission in flight per submitter; a second attempt is refused
//! - A timeout is reported as an unknown outcome, never as a failure
//! - The balance cache is never decremented locally

pub mod notifier;
pub mod submitter;

pub use notifier::{Outcome, SettlementEvent, SettlementKind, SettlementNotifier};
pub use submitter::{BatchSubmitter, SubmitOutcome};

use std::sync::atomic::{AtomicBool, Ordering};

use crate::wallet::FetchError;

pub type SubmitResult<T> = Result<T, SubmitError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("Please add bids to submit")]
    EmptyBatch,

    #[error("Not enough wallet balance: {available} < {required}")]
    InsufficientFunds { required: u64, available: i64 },

    #[error("A submission is already in progress")]
    InProgress,

    #[error(transparent)]
    BalanceUnavailable(#[from] FetchError),

    #[error("{message}")]
    Rejected { message: String },

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Submission timed out; refresh your balance before retrying")]
    Timeout,

    #[error("Unreadable settlement response ({0}); refresh your balance before retrying")]
    Ambiguous(String),
}

impl SubmitError {
    /// The request may have been applied server-side.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, SubmitError::Timeout | SubmitError::Ambiguous(_))
    }

    /// Raised before any settlement request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            SubmitError::EmptyBatch
                | SubmitError::InsufficientFunds { .. }
                | SubmitError::InProgress
                | SubmitError::BalanceUnavailable(_)
        )
    }
}

/// Single-in-flight flag, released on drop.
pub(crate) struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_released_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _held = InFlight::acquire(&flag).unwrap();
            assert!(InFlight::acquire(&flag).is_none());
        }
        assert!(InFlight::acquire(&flag).is_some());
    }

    #[test]
    fn test_unknown_outcomes() {
        assert!(SubmitError::Timeout.outcome_unknown());
        assert!(SubmitError::Ambiguous("eof".into()).outcome_unknown());
        assert!(!SubmitError::Rejected { message: "closed".into() }.outcome_unknown());
        assert!(SubmitError::EmptyBatch.is_local());
    }
}
