//! Ledger - Trusted Balance Owner
//!
//! Server-side counterpart of the client core. Re-runs every rule the client
//! checks, owns the balances, and deduplicates on idempotency keys.
//!
//! ## Concurrency:
//! - One async mutex per account; read-then-debit happens under it
//! - tokio's mutex is fair, so a user's requests apply in receipt order
//! - Receipt lookup happens under the same lock, so two copies of one
//!   request can never both debit
//!
//! ## Persistence:
//! Optional. With a data path every mutation is written through to redb
//! before it becomes visible in memory.

pub mod store;

pub use store::{LedgerStore, StoredState};

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{
    BankDetails, BidHistoryQuery, BidRecord, BidResponse, BidSubmission, StoreResponse,
    UpiNumbers, UserId, WithdrawalRecord, WithdrawalRequest, WithdrawalResponse, WithdrawalStatus,
};
use crate::clock::Clock;
use crate::market::{MarketId, MarketRegistry, MarketSession, PanelCatalog};
use crate::wager::{validate_candidate, WagerCandidate};
use crate::wallet::covers;
use crate::withdrawal::{validate_bank_details, validate_upi_numbers, PayoutProfile, WithdrawalPolicy};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Infrastructure failures only. Business rejections are answered with a
/// negative response body, never with an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Credit amount must be positive")]
    ZeroCredit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: i64,
    pub withdrawals_allowed: bool,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            balance: 0,
            withdrawals_allowed: true,
        }
    }
}

/// Stored answer to an accepted request, replayed on a repeated key by the
/// same user only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Receipt {
    Bids {
        user_id: UserId,
        response: BidResponse,
    },
    Withdrawal {
        user_id: UserId,
        response: WithdrawalResponse,
    },
}

const KEY_REUSED: &str = "Idempotency key already used";

fn reject_bids(message: impl Into<String>) -> BidResponse {
    BidResponse {
        success: false,
        error_msg: message.into(),
    }
}

fn reject_withdrawal(message: impl Into<String>) -> WithdrawalResponse {
    WithdrawalResponse {
        status: false,
        message: message.into(),
    }
}

pub struct Ledger {
    accounts: DashMap<UserId, Arc<Mutex<Account>>>,
    receipts: DashMap<Uuid, Receipt>,
    profiles: DashMap<UserId, PayoutProfile>,
    bids: RwLock<Vec<BidRecord>>,
    withdrawals: RwLock<Vec<WithdrawalRecord>>,
    markets: MarketRegistry,
    catalog: Arc<PanelCatalog>,
    policy: WithdrawalPolicy,
    clock: Arc<dyn Clock>,
    store: Option<LedgerStore>,
}

impl Ledger {
    /// In-memory ledger with the standard panel chart.
    pub fn new(policy: WithdrawalPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: DashMap::new(),
            receipts: DashMap::new(),
            profiles: DashMap::new(),
            bids: RwLock::new(Vec::new()),
            withdrawals: RwLock::new(Vec::new()),
            markets: MarketRegistry::new(),
            catalog: Arc::new(PanelCatalog::standard()),
            policy,
            clock,
            store: None,
        }
    }

    /// Ledger backed by a redb database under `dir`, reloading whatever is
    /// already there.
    pub fn open(dir: impl AsRef<std::path::Path>, policy: WithdrawalPolicy, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        let store = LedgerStore::open(dir)?;
        let state = store.load()?;

        let mut ledger = Self::new(policy, clock);
        for (user_id, account) in state.accounts {
            ledger.accounts.insert(user_id, Arc::new(Mutex::new(account)));
        }
        for (token, receipt) in state.receipts {
            ledger.receipts.insert(token, receipt);
        }
        for (user_id, profile) in state.profiles {
            ledger.profiles.insert(user_id, profile);
        }
        *ledger.bids.get_mut() = state.bids;
        *ledger.withdrawals.get_mut() = state.withdrawals;
        ledger.store = Some(store);

        Ok(ledger)
    }

    pub fn with_catalog(mut self, catalog: Arc<PanelCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn catalog(&self) -> Arc<PanelCatalog> {
        self.catalog.clone()
    }

    pub fn policy(&self) -> &WithdrawalPolicy {
        &self.policy
    }

    /// Existing account, or a detached empty one for an unknown user.
    /// Nothing can be debited from an empty account, so it is never inserted.
    fn account(&self, user_id: UserId) -> Arc<Mutex<Account>> {
        self.accounts
            .get(&user_id)
            .map(|a| a.value().clone())
            .unwrap_or_default()
    }

    fn account_mut(&self, user_id: UserId) -> Arc<Mutex<Account>> {
        self.accounts.entry(user_id).or_default().clone()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    // ========================================================================
    // MARKETS
    // ========================================================================

    pub fn markets(&self) -> Vec<MarketSession> {
        self.markets.list()
    }

    pub fn market(&self, market_id: MarketId) -> Option<MarketSession> {
        self.markets.get(market_id)
    }

    pub fn upsert_market(&self, market: MarketSession) {
        info!(market_id = market.market_id, open = market.open_active, close = market.close_active, "📋 Market updated");
        self.markets.upsert(market);
    }

    pub fn replace_markets(&self, markets: Vec<MarketSession>) {
        info!(count = markets.len(), "📋 Market listing replaced");
        self.markets.replace_all(markets);
    }

    // ========================================================================
    // BALANCES
    // ========================================================================

    /// Waits for any in-flight operation on the account, so the value
    /// reflects every request received before this read.
    pub async fn balance(&self, user_id: UserId) -> i64 {
        self.account(user_id).lock().await.balance
    }

    pub async fn withdrawals_allowed(&self, user_id: UserId) -> bool {
        self.account(user_id).lock().await.withdrawals_allowed
    }

    /// Operator top-up.
    pub async fn credit(&self, user_id: UserId, amount: u64) -> LedgerResult<i64> {
        if amount == 0 {
            return Err(LedgerError::ZeroCredit);
        }
        let account = self.account_mut(user_id);
        let mut account = account.lock().await;

        let mut next = *account;
        next.balance = next.balance.saturating_add(i64::try_from(amount).unwrap_or(i64::MAX));
        if let Some(store) = &self.store {
            store.save_account(user_id, &next)?;
        }
        *account = next;

        info!(user_id, amount, balance = account.balance, "✅ Account credited");
        Ok(account.balance)
    }

    pub async fn set_withdrawals_allowed(&self, user_id: UserId, allowed: bool) -> LedgerResult<()> {
        let account = self.account_mut(user_id);
        let mut account = account.lock().await;

        let mut next = *account;
        next.withdrawals_allowed = allowed;
        if let Some(store) = &self.store {
            store.save_account(user_id, &next)?;
        }
        *account = next;
        Ok(())
    }

    // ========================================================================
    // BIDS
    // ========================================================================

    /// Applies a whole batch or none of it.
    pub async fn place_bids(&self, submission: &BidSubmission) -> LedgerResult<BidResponse> {
        let Some(first) = submission.bids.first() else {
            return Ok(reject_bids("Please add bids to submit"));
        };
        let (user_id, market_id) = (first.user_id, first.market_id);
        if submission.bids.iter().any(|b| b.user_id != user_id) {
            return Ok(reject_bids("All bids in a batch must belong to one user"));
        }
        if submission.bids.iter().any(|b| b.market_id != market_id) {
            return Ok(reject_bids("All bids in a batch must target one market"));
        }

        let token = submission.idempotency_key;
        let account = self.account(user_id);
        let mut account = account.lock().await;

        if let Some(receipt) = self.receipts.get(&token) {
            return Ok(match receipt.value() {
                Receipt::Bids { user_id: owner, response } if *owner == user_id => {
                    debug!(%token, "♻️ Replaying stored receipt");
                    response.clone()
                }
                _ => {
                    warn!(user_id, %token, "Idempotency key reused");
                    reject_bids(KEY_REUSED)
                }
            });
        }

        let Some(market) = self.markets.get(market_id) else {
            return Ok(reject_bids(format!("Market {} not found", market_id)));
        };

        for (i, line) in submission.bids.iter().enumerate() {
            let candidate = WagerCandidate::new(line.bet_type, line.bet_digit.clone(), line.bet_amount, line.market_session);
            if let Err(e) = validate_candidate(&market, &self.catalog, &candidate) {
                warn!(user_id, market_id, bid = i + 1, error = %e, "Bid rejected");
                return Ok(reject_bids(format!("Bid {}: {}", i + 1, e)));
            }
        }

        // Every line is at most MAX_STAKE, so a covered total fits in i64.
        let total = match submission.total_stake() {
            Some(total) if covers(account.balance, total) => total,
            _ => return Ok(reject_bids("Insufficient wallet balance.")),
        };

        let mut next = *account;
        next.balance -= total as i64;

        let placed_at = self.clock.now();
        let records: Vec<BidRecord> = submission
            .bids
            .iter()
            .enumerate()
            .map(|(i, line)| BidRecord {
                bid_id: format!("{}-{}", token, i),
                user_id,
                market_id,
                market_session: line.market_session,
                bet_type: line.bet_type,
                bet_digit: line.bet_digit.trim().to_string(),
                bet_amount: line.bet_amount,
                placed_at,
            })
            .collect();

        let response = BidResponse {
            success: true,
            error_msg: "Bids placed successfully".to_string(),
        };
        let receipt = Receipt::Bids {
            user_id,
            response: response.clone(),
        };

        if let Some(store) = &self.store {
            store.commit_bids(user_id, &next, token, &receipt, &records)?;
        }
        *account = next;
        self.receipts.insert(token, receipt);
        self.bids.write().extend(records);

        info!(user_id, market_id, count = submission.bids.len(), total, balance = account.balance, %token, "🎯 Bids placed");
        Ok(response)
    }

    /// Newest first.
    pub fn bid_history(&self, query: &BidHistoryQuery) -> Vec<BidRecord> {
        let mut matches: Vec<BidRecord> = self
            .bids
            .read()
            .iter()
            .filter(|b| b.user_id == query.user_id)
            .filter(|b| query.market_id.map_or(true, |m| b.market_id == m))
            .filter(|b| query.bid_type.map_or(true, |t| b.bet_type == t))
            .filter(|b| query.bid_session.map_or(true, |s| b.market_session == s))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then_with(|| b.bid_id.cmp(&a.bid_id)));
        matches
    }

    // ========================================================================
    // WITHDRAWALS
    // ========================================================================

    pub async fn request_withdrawal(&self, request: &WithdrawalRequest) -> LedgerResult<WithdrawalResponse> {
        let token = request.idempotency_key;
        let user_id = request.user_id;
        let account = self.account(user_id);
        let mut account = account.lock().await;

        if let Some(receipt) = self.receipts.get(&token) {
            return Ok(match receipt.value() {
                Receipt::Withdrawal { user_id: owner, response } if *owner == user_id => {
                    debug!(%token, "♻️ Replaying stored receipt");
                    response.clone()
                }
                _ => {
                    warn!(user_id, %token, "Idempotency key reused");
                    reject_withdrawal(KEY_REUSED)
                }
            });
        }

        if !account.withdrawals_allowed {
            return Ok(reject_withdrawal("Withdrawals are not enabled for this account"));
        }
        let registered = self
            .profiles
            .get(&user_id)
            .is_some_and(|p| p.has(request.number));
        if !registered {
            return Ok(reject_withdrawal(format!("Payout method {} is not registered", request.number)));
        }
        if let Err(e) = self
            .policy
            .validate(&request.amount.to_string(), account.balance, self.clock.now())
        {
            warn!(user_id, amount = request.amount, error = %e, "Withdrawal rejected");
            return Ok(reject_withdrawal(e.to_string()));
        }

        let mut next = *account;
        next.balance -= request.amount as i64;

        let record = WithdrawalRecord {
            withdrawal_id: token.to_string(),
            user_id,
            amount: request.amount,
            method: request.number,
            status: WithdrawalStatus::Pending,
            requested_at: self.clock.now(),
        };
        let response = WithdrawalResponse {
            status: true,
            message: "Withdraw request submitted".to_string(),
        };
        let receipt = Receipt::Withdrawal {
            user_id,
            response: response.clone(),
        };

        if let Some(store) = &self.store {
            store.commit_withdrawal(user_id, &next, token, &receipt, &record)?;
        }
        *account = next;
        self.receipts.insert(token, receipt);
        self.withdrawals.write().push(record);

        info!(user_id, amount = request.amount, method = %request.number, balance = account.balance, %token, "💸 Withdrawal queued");
        Ok(response)
    }

    pub fn pending_withdrawals(&self, user_id: UserId) -> Vec<WithdrawalRecord> {
        self.withdrawals
            .read()
            .iter()
            .filter(|w| w.user_id == user_id && w.status == WithdrawalStatus::Pending)
            .cloned()
            .collect()
    }

    // ========================================================================
    // PAYOUT PROFILES
    // ========================================================================

    pub fn profile(&self, user_id: UserId) -> Option<PayoutProfile> {
        self.profiles.get(&user_id).map(|p| p.clone())
    }

    pub fn store_bank_details(&self, details: &BankDetails) -> LedgerResult<StoreResponse> {
        if let Err(e) = validate_bank_details(details) {
            return Ok(StoreResponse {
                success: false,
                message: e.to_string(),
            });
        }
        self.update_profile(details.user_id, |p| p.apply_bank_details(details))?;
        Ok(StoreResponse {
            success: true,
            message: "Bank details saved".to_string(),
        })
    }

    pub fn store_upi_numbers(&self, numbers: &UpiNumbers) -> LedgerResult<StoreResponse> {
        if let Err(e) = validate_upi_numbers(numbers) {
            return Ok(StoreResponse {
                success: false,
                message: e.to_string(),
            });
        }
        self.update_profile(numbers.user_id, |p| p.apply_upi_numbers(numbers))?;
        Ok(StoreResponse {
            success: true,
            message: "UPI numbers saved".to_string(),
        })
    }

    fn update_profile(&self, user_id: UserId, apply: impl FnOnce(&mut PayoutProfile)) -> LedgerResult<()> {
        let mut entry = self.profiles.entry(user_id).or_default();
        let mut next = entry.clone();
        apply(&mut next);
        if let Some(store) = &self.store {
            store.save_profile(user_id, &next)?;
        }
        *entry = next;
        info!(user_id, "🏦 Payout profile updated");
        Ok(())
    }
}
