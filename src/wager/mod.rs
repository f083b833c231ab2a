//! Wager Composition
//!
//! Drafts are validated by one table-driven validator ([`validate_candidate`])
//! shared by the client-side [`WagerBatch`] and the ledger, so both sides
//! enforce the same stake floor, payload shapes and session rule.
//!
//! ## Flow:
//! 1. Market snapshot fixes the batch's market and default session
//! 2. Each confirmed entry is validated and appended as a [`WagerDraft`]
//! 3. Drafts may be removed by index or bulk-moved to another session
//! 4. The batch is handed to the settlement submitter as a whole

pub mod batch;
pub mod types;

pub use batch::{BatchTotals, WagerBatch};
pub use types::{
    validate_candidate, PayloadShape, WagerCandidate, WagerDraft, WagerType, MAX_STAKE, MIN_STAKE,
    SHAPE_TABLE,
};

use crate::market::{MarketId, Session};

/// Rejections raised before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Minimum bid amount is {min} (got {stake})")]
    InvalidStake { stake: u64, min: u64 },

    #[error("Bid amount {stake} exceeds the maximum of {max}")]
    StakeTooLarge { stake: u64, max: u64 },

    #[error("Digit '{payload}' does not fit bet type {wager_type}")]
    InvalidDigitShape { wager_type: WagerType, payload: String },

    #[error("Session {session} is closed for market {market_id}")]
    SessionClosed { market_id: MarketId, session: Session },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("No bid at position {index} (batch holds {len})")]
pub struct IndexError {
    pub index: usize,
    pub len: usize,
}
