//! Backend Collaborators
//!
//! Every money-moving or authoritative read goes through one of these
//! traits. Components receive them as `Arc<dyn ...>` handles; nothing
//! reaches for ambient storage.
//!
//! Implementations:
//! - [`HttpBackend`]: JSON over HTTP (reqwest)
//! - [`LocalBackend`]: in-process adapter over a shared [`crate::ledger::Ledger`]

pub mod http;
pub mod local;
pub mod types;

pub use http::HttpBackend;
pub use local::LocalBackend;
pub use types::*;

use async_trait::async_trait;

use crate::market::MarketSession;
use crate::withdrawal::PayoutProfile;

/// Transport-level failures. An explicit rejection is never one of these:
/// it arrives as a well-formed response with a negative flag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request was never applied (connect failure, storage abort).
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    /// Server error, or a reply lost or unreadable after delivery.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait WalletApi: Send + Sync {
    async fn fetch_balance(&self, user_id: UserId) -> Result<i64, BackendError>;
}

#[async_trait]
pub trait SettlementApi: Send + Sync {
    async fn submit_bids(&self, submission: &BidSubmission) -> Result<BidResponse, BackendError>;
}

#[async_trait]
pub trait WithdrawalApi: Send + Sync {
    async fn submit_withdrawal(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalResponse, BackendError>;

    async fn pending_withdrawals(&self, user_id: UserId) -> Result<Vec<WithdrawalRecord>, BackendError>;
}

#[async_trait]
pub trait MarketApi: Send + Sync {
    async fn fetch_markets(&self) -> Result<Vec<MarketSession>, BackendError>;
}

#[async_trait]
pub trait PayoutProfileApi: Send + Sync {
    /// `None` when the user has nothing on file.
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<PayoutProfile>, BackendError>;

    async fn store_bank_details(&self, details: &BankDetails) -> Result<StoreResponse, BackendError>;

    async fn store_upi_numbers(&self, numbers: &UpiNumbers) -> Result<StoreResponse, BackendError>;
}

#[async_trait]
pub trait BidHistoryApi: Send + Sync {
    async fn bid_history(&self, query: &BidHistoryQuery) -> Result<Vec<BidRecord>, BackendError>;
}
