//! Balance Guard
//!
//! Client-side cache of the wallet balance. The cache is never adjusted
//! locally: only an authoritative read through [`WalletApi`] replaces it.
//! Money-moving operations call [`BalanceGuard::refresh`] right before
//! checking funds; [`BalanceGuard::current`] is for instantaneous checks only.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::{BackendError, UserId, WalletApi};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Balance unavailable: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub balance: i64,
    /// Completed authoritative reads so far.
    pub refresh_count: u64,
}

/// `true` when `balance` covers a debit of `amount`.
pub fn covers(balance: i64, amount: u64) -> bool {
    balance >= 0 && amount <= balance as u64
}

pub struct BalanceGuard {
    user_id: UserId,
    wallet: Arc<dyn WalletApi>,
    state: RwLock<BalanceSnapshot>,
    /// Serializes refreshes so the last completed read is the latest issued.
    refresh_lock: Mutex<()>,
}

impl BalanceGuard {
    pub fn new(user_id: UserId, wallet: Arc<dyn WalletApi>) -> Self {
        Self {
            user_id,
            wallet,
            state: RwLock::new(BalanceSnapshot {
                balance: 0,
                refresh_count: 0,
            }),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Fetches the authoritative balance and replaces the cached value.
    /// A failed fetch leaves the cache untouched.
    pub async fn refresh(&self) -> Result<i64, FetchError> {
        let _serial = self.refresh_lock.lock().await;

        let balance = match self.wallet.fetch_balance(self.user_id).await {
            Ok(b) => b,
            Err(e) => {
                warn!(user_id = self.user_id, error = %e, "Balance refresh failed");
                return Err(e.into());
            }
        };

        let mut state = self.state.write();
        state.balance = balance;
        state.refresh_count += 1;
        info!(user_id = self.user_id, balance, refresh = state.refresh_count, "💰 Balance refreshed");
        Ok(balance)
    }

    pub fn current(&self) -> i64 {
        self.state.read().balance
    }

    pub fn refresh_count(&self) -> u64 {
        self.state.read().refresh_count
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        *self.state.read()
    }
}
