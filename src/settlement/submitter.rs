//! Batch submission and result interpretation.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::notifier::{Outcome, SettlementEvent, SettlementKind, SettlementNotifier};
use super::{InFlight, SubmitError, SubmitResult};
use crate::backend::{BackendError, SettlementApi};
use crate::wager::WagerBatch;
use crate::wallet::{covers, FetchError};

/// Accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    /// Server text, verbatim.
    pub message: String,
    pub idempotency_key: Uuid,
    pub count: usize,
    pub total_stake: u64,
}

pub struct BatchSubmitter {
    settlement: Arc<dyn SettlementApi>,
    notifier: Arc<SettlementNotifier>,
    timeout: Duration,
    in_flight: AtomicBool,
    reconciliation: Mutex<Option<JoinHandle<Result<i64, FetchError>>>>,
}

impl BatchSubmitter {
    pub fn new(
        settlement: Arc<dyn SettlementApi>,
        notifier: Arc<SettlementNotifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            settlement,
            notifier,
            timeout,
            in_flight: AtomicBool::new(false),
            reconciliation: Mutex::new(None),
        }
    }

    /// Submits against a balance the caller has just fetched.
    ///
    /// Neither precondition failure makes a network call.
    pub async fn submit(&self, batch: &mut WagerBatch, current_balance: i64) -> SubmitResult<SubmitOutcome> {
        let _flight = InFlight::acquire(&self.in_flight).ok_or(SubmitError::InProgress)?;
        self.submit_locked(batch, current_balance).await
    }

    /// Refreshes the balance first, then submits against the fresh value.
    pub async fn submit_fresh(&self, batch: &mut WagerBatch) -> SubmitResult<SubmitOutcome> {
        let _flight = InFlight::acquire(&self.in_flight).ok_or(SubmitError::InProgress)?;
        if batch.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }
        let balance = self.notifier.balance_guard().refresh().await?;
        self.submit_locked(batch, balance).await
    }

    /// Waits for the balance refresh triggered by the last settled
    /// submission, if one is pending.
    pub async fn await_reconciliation(&self) -> Option<Result<i64, FetchError>> {
        let handle = self.reconciliation.lock().take()?;
        match handle.await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, "Reconciliation task aborted");
                None
            }
        }
    }

    async fn submit_locked(&self, batch: &mut WagerBatch, current_balance: i64) -> SubmitResult<SubmitOutcome> {
        if batch.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }

        let totals = batch.totals();
        if !covers(current_balance, totals.total_stake) {
            return Err(SubmitError::InsufficientFunds {
                required: totals.total_stake,
                available: current_balance,
            });
        }

        let user_id = self.notifier.balance_guard().user_id();
        let submission = batch.to_submission(user_id);
        let token = submission.idempotency_key;

        info!(
            user_id,
            market_id = batch.market().market_id,
            count = totals.count,
            total_stake = totals.total_stake,
            %token,
            "📤 Submitting bid batch"
        );

        let response = match tokio::time::timeout(self.timeout, self.settlement.submit_bids(&submission)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        };

        match response {
            Ok(reply) if reply.success => {
                batch.clear();
                self.report(Outcome::Accepted, &reply.error_msg, token);
                Ok(SubmitOutcome {
                    message: reply.error_msg,
                    idempotency_key: token,
                    count: totals.count,
                    total_stake: totals.total_stake,
                })
            }
            Ok(reply) => {
                self.report(Outcome::Rejected, &reply.error_msg, token);
                Err(SubmitError::Rejected { message: reply.error_msg })
            }
            Err(BackendError::Timeout) => {
                self.report(Outcome::Unknown, "timed out", token);
                Err(SubmitError::Timeout)
            }
            Err(BackendError::Malformed(detail)) => {
                self.report(Outcome::Unknown, &detail, token);
                Err(SubmitError::Ambiguous(detail))
            }
            Err(BackendError::Network(detail)) => {
                self.report(Outcome::Rejected, &detail, token);
                Err(SubmitError::Network(detail))
            }
        }
    }

    fn report(&self, outcome: Outcome, message: &str, token: Uuid) {
        let handle = self.notifier.notify(SettlementEvent {
            kind: SettlementKind::Batch,
            outcome,
            message: message.to_string(),
            token,
        });
        *self.reconciliation.lock() = Some(handle);
    }
}
