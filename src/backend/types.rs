//! Request/response bodies exchanged with the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::market::{MarketId, Session};
use crate::wager::WagerType;
use crate::withdrawal::{PayoutMethodKind, PayoutProfile};

/// Acting user id as issued by the session collaborator.
pub type UserId = u64;

// ============================================================================
// BIDS
// ============================================================================

/// One wager line of a batch submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidLine {
    pub market_id: MarketId,
    pub market_session: Session,
    pub bet_type: WagerType,
    pub bet_digit: String,
    pub bet_amount: u64,
    pub user_id: UserId,
}

/// A whole batch, accepted or rejected as one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidSubmission {
    pub idempotency_key: Uuid,
    pub bids: Vec<BidLine>,
}

impl BidSubmission {
    /// `None` when the stakes overflow `u64`.
    pub fn total_stake(&self) -> Option<u64> {
        self.bids
            .iter()
            .try_fold(0u64, |acc, b| acc.checked_add(b.bet_amount))
    }
}

/// `error_msg` carries the human-readable text on success as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidResponse {
    pub success: bool,
    #[serde(default)]
    pub error_msg: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidHistoryQuery {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_id: Option<MarketId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_type: Option<WagerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidRecord {
    pub bid_id: String,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub market_session: Session,
    pub bet_type: WagerType,
    pub bet_digit: String,
    pub bet_amount: u64,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidHistoryResponse {
    pub status: u8,
    #[serde(default)]
    pub bids: Vec<BidRecord>,
}

// ============================================================================
// WALLET
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub user_id: UserId,
    pub balance: i64,
}

// ============================================================================
// WITHDRAWALS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Selected payout method id.
    pub number: PayoutMethodKind,
    pub user_id: UserId,
    pub amount: u64,
    pub idempotency_key: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub status: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub withdrawal_id: String,
    pub user_id: UserId,
    pub amount: u64,
    pub method: PayoutMethodKind,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
}

// ============================================================================
// PAYOUT PROFILE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub profile: PayoutProfile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub user_id: UserId,
    pub ac_holder_name: String,
    pub bank_name: String,
    pub ac_number: String,
    pub ifsc_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpiNumbers {
    pub user_id: UserId,
    #[serde(default)]
    pub paytm_number: Option<String>,
    #[serde(default)]
    pub phonepe_number: Option<String>,
    #[serde(default)]
    pub gpay_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}
