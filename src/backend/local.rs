//! In-process collaborator over a shared [`Ledger`].

use std::sync::Arc;

use async_trait::async_trait;

use super::*;
use crate::ledger::{Ledger, LedgerError};
use crate::market::MarketSession;
use crate::withdrawal::PayoutProfile;

/// Storage failures surface the same way a 5xx would over HTTP.
impl From<LedgerError> for BackendError {
    fn from(err: LedgerError) -> Self {
        BackendError::Network(err.to_string())
    }
}

#[derive(Clone)]
pub struct LocalBackend {
    ledger: Arc<Ledger>,
}

impl LocalBackend {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}

#[async_trait]
impl WalletApi for LocalBackend {
    async fn fetch_balance(&self, user_id: UserId) -> Result<i64, BackendError> {
        Ok(self.ledger.balance(user_id).await)
    }
}

#[async_trait]
impl SettlementApi for LocalBackend {
    async fn submit_bids(&self, submission: &BidSubmission) -> Result<BidResponse, BackendError> {
        Ok(self.ledger.place_bids(submission).await?)
    }
}

#[async_trait]
impl WithdrawalApi for LocalBackend {
    async fn submit_withdrawal(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalResponse, BackendError> {
        Ok(self.ledger.request_withdrawal(request).await?)
    }

    async fn pending_withdrawals(&self, user_id: UserId) -> Result<Vec<WithdrawalRecord>, BackendError> {
        Ok(self.ledger.pending_withdrawals(user_id))
    }
}

#[async_trait]
impl MarketApi for LocalBackend {
    async fn fetch_markets(&self) -> Result<Vec<MarketSession>, BackendError> {
        Ok(self.ledger.markets())
    }
}

#[async_trait]
impl PayoutProfileApi for LocalBackend {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<PayoutProfile>, BackendError> {
        Ok(self.ledger.profile(user_id))
    }

    async fn store_bank_details(&self, details: &BankDetails) -> Result<StoreResponse, BackendError> {
        Ok(self.ledger.store_bank_details(details)?)
    }

    async fn store_upi_numbers(&self, numbers: &UpiNumbers) -> Result<StoreResponse, BackendError> {
        Ok(self.ledger.store_upi_numbers(numbers)?)
    }
}

#[async_trait]
impl BidHistoryApi for LocalBackend {
    async fn bid_history(&self, query: &BidHistoryQuery) -> Result<Vec<BidRecord>, BackendError> {
        Ok(self.ledger.bid_history(query))
    }
}
