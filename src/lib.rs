//! Ledger-Guarded Request Composer
//!
//! Client core for composing wager batches and withdrawal intents, plus the
//! trusted ledger that settles them.
//!
//! ## Architecture
//!
//! - **Client core**: `WagerBatch`, `BatchSubmitter`, `BalanceGuard`,
//!   `SettlementNotifier`, `WithdrawalGate`. Talks to the backend only
//!   through the collaborator traits in [`backend`].
//! - **Ledger**: owns balances, re-validates everything, serializes
//!   read-then-debit per user, deduplicates on idempotency keys.
//! - **Server**: Axum router over the ledger ([`routes`]).
//! - **Storage**: optional ReDB write-through.

pub mod backend;
pub mod clock;
pub mod config;
pub mod ledger;
pub mod market;
pub mod routes;
pub mod settlement;
pub mod wager;
pub mod wallet;
pub mod withdrawal;

// ============================================================================
// PUBLIC API
// ============================================================================

// Collaborators
pub use backend::{
    BackendError, BidHistoryApi, HttpBackend, LocalBackend, MarketApi, PayoutProfileApi,
    SettlementApi, UserId, WalletApi, WithdrawalApi,
};

// Markets & wagers
pub use market::{MarketId, MarketSession, PanelCatalog, PanelKind, Session};
pub use wager::{
    BatchTotals, IndexError, ValidationError, WagerBatch, WagerCandidate, WagerDraft, WagerType,
    MAX_STAKE, MIN_STAKE,
};

// Client core
pub use settlement::{
    BatchSubmitter, Outcome, SettlementEvent, SettlementKind, SettlementNotifier, SubmitError,
    SubmitOutcome,
};
pub use wallet::{BalanceGuard, FetchError};
pub use withdrawal::{
    GateContext, GateDisabled, NextView, PayoutMethodKind, PayoutProfile, WithdrawalError,
    WithdrawalGate, WithdrawalPolicy, WithdrawalReceipt, WithdrawalState,
};

// Ledger & server
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use ledger::{Ledger, LedgerError};
pub use routes::{build_router, AppState};
