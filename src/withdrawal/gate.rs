//! Withdrawal intent state machine.
//!
//! ## Flow:
//! 1. `open` refuses outright when the account may not withdraw or holds nothing
//! 2. `enter_amount` runs the policy checks against the cached balance
//! 3. `select_method` picks one of the registered payout methods
//! 4. `submit` refreshes the balance, re-checks everything, sends one request
//!
//! A rejected intent keeps its amount and drops the method. A timed-out one
//! keeps its token so a retry is deduplicated by the ledger.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use super::payout::{PayoutMethod, PayoutMethodKind, PayoutProfile};
use super::{GateDisabled, WithdrawalError, WithdrawalPolicy};
use crate::backend::{BackendError, UserId, WithdrawalApi, WithdrawalRecord, WithdrawalRequest};
use crate::clock::Clock;
use crate::settlement::{InFlight, Outcome, SettlementEvent, SettlementKind, SettlementNotifier};
use crate::wallet::FetchError;

impl From<BackendError> for WithdrawalError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Network(detail) => WithdrawalError::Network(detail),
            BackendError::Timeout => WithdrawalError::Timeout,
            BackendError::Malformed(detail) => WithdrawalError::Ambiguous(detail),
        }
    }
}

/// Everything the gate needs to know about the acting user up front.
#[derive(Debug, Clone)]
pub struct GateContext {
    pub policy: WithdrawalPolicy,
    pub withdrawals_allowed: bool,
    pub profile: Option<PayoutProfile>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WithdrawalState {
    Drafting,
    Validated {
        amount: u64,
        token: Uuid,
    },
    MethodSelected {
        amount: u64,
        method: PayoutMethodKind,
        token: Uuid,
    },
    Submitted {
        amount: u64,
        method: PayoutMethodKind,
        token: Uuid,
    },
    /// Amount cleared; a new `enter_amount` starts the next intent.
    Accepted {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextView {
    PendingWithdrawals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalReceipt {
    pub message: String,
    pub amount: u64,
    pub method: PayoutMethodKind,
    pub token: Uuid,
    pub next_view: NextView,
}

pub struct WithdrawalGate {
    user_id: UserId,
    ctx: GateContext,
    api: Arc<dyn WithdrawalApi>,
    notifier: Arc<SettlementNotifier>,
    clock: Arc<dyn Clock>,
    state: Mutex<WithdrawalState>,
    in_flight: AtomicBool,
    reconciliation: Mutex<Option<JoinHandle<Result<i64, FetchError>>>>,
}

impl WithdrawalGate {
    /// Checks the two terminal short-circuits against the guard's cached
    /// balance. Refresh the guard first for an up-to-date answer.
    pub fn open(
        ctx: GateContext,
        api: Arc<dyn WithdrawalApi>,
        notifier: Arc<SettlementNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GateDisabled> {
        let guard = notifier.balance_guard();
        if !ctx.withdrawals_allowed {
            return Err(GateDisabled::NotPermitted);
        }
        if guard.current() <= 0 {
            return Err(GateDisabled::NoBalance);
        }

        Ok(Self {
            user_id: guard.user_id(),
            ctx,
            api,
            notifier,
            clock,
            state: Mutex::new(WithdrawalState::Drafting),
            in_flight: AtomicBool::new(false),
            reconciliation: Mutex::new(None),
        })
    }

    pub fn state(&self) -> WithdrawalState {
        self.state.lock().clone()
    }

    pub fn policy(&self) -> &WithdrawalPolicy {
        &self.ctx.policy
    }

    /// Exactly the methods registered on the profile.
    pub fn available_methods(&self) -> Vec<PayoutMethod> {
        self.ctx
            .profile
            .as_ref()
            .map(PayoutProfile::available_methods)
            .unwrap_or_default()
    }

    /// Validates `text` against the cached balance. Any previous method
    /// selection is discarded.
    pub fn enter_amount(&self, text: &str) -> Result<u64, WithdrawalError> {
        let _flight = InFlight::acquire(&self.in_flight).ok_or(WithdrawalError::InProgress)?;
        let balance = self.notifier.balance_guard().current();
        let mut state = self.state.lock();

        match self.ctx.policy.validate(text, balance, self.clock.now()) {
            Ok(amount) => {
                *state = WithdrawalState::Validated {
                    amount,
                    token: Uuid::new_v4(),
                };
                Ok(amount)
            }
            Err(e) => {
                *state = WithdrawalState::Drafting;
                Err(e)
            }
        }
    }

    pub fn select_method(&self, method: PayoutMethodKind) -> Result<(), WithdrawalError> {
        let _flight = InFlight::acquire(&self.in_flight).ok_or(WithdrawalError::InProgress)?;
        let mut state = self.state.lock();

        let (amount, token) = match &*state {
            WithdrawalState::Validated { amount, token }
            | WithdrawalState::MethodSelected { amount, token, .. } => (*amount, *token),
            _ => return Err(WithdrawalError::AmountNotEntered),
        };

        let methods = self.available_methods();
        if methods.is_empty() {
            return Err(WithdrawalError::NoPayoutMethod);
        }
        if !methods.iter().any(|m| m.kind == method) {
            return Err(WithdrawalError::MethodNotRegistered(method));
        }

        *state = WithdrawalState::MethodSelected { amount, method, token };
        Ok(())
    }

    pub async fn submit(&self) -> Result<WithdrawalReceipt, WithdrawalError> {
        let _flight = InFlight::acquire(&self.in_flight).ok_or(WithdrawalError::InProgress)?;

        // A Submitted state outside the flight guard is an abandoned attempt;
        // retry it under the same token.
        let (amount, method, token) = match &*self.state.lock() {
            WithdrawalState::MethodSelected { amount, method, token }
            | WithdrawalState::Submitted { amount, method, token } => (*amount, *method, *token),
            WithdrawalState::Validated { .. } => return Err(WithdrawalError::NoMethodSelected),
            WithdrawalState::Drafting | WithdrawalState::Accepted { .. } => {
                return Err(WithdrawalError::AmountNotEntered)
            }
        };

        let balance = self.notifier.balance_guard().refresh().await?;
        self.ctx
            .policy
            .validate(&amount.to_string(), balance, self.clock.now())?;
        if !self.ctx.profile.as_ref().is_some_and(|p| p.has(method)) {
            return Err(WithdrawalError::MethodNotRegistered(method));
        }

        *self.state.lock() = WithdrawalState::Submitted { amount, method, token };

        let request = WithdrawalRequest {
            number: method,
            user_id: self.user_id,
            amount,
            idempotency_key: token,
        };
        info!(user_id = self.user_id, amount, %method, %token, "📤 Submitting withdrawal");

        let response = match tokio::time::timeout(self.ctx.timeout, self.api.submit_withdrawal(&request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout),
        };

        match response {
            Ok(reply) if reply.status => {
                *self.state.lock() = WithdrawalState::Accepted {
                    message: reply.message.clone(),
                };
                self.report(Outcome::Accepted, &reply.message, token);
                Ok(WithdrawalReceipt {
                    message: reply.message,
                    amount,
                    method,
                    token,
                    next_view: NextView::PendingWithdrawals,
                })
            }
            Ok(reply) => {
                *self.state.lock() = WithdrawalState::Validated {
                    amount,
                    token: Uuid::new_v4(),
                };
                self.report(Outcome::Rejected, &reply.message, token);
                Err(WithdrawalError::Rejected { message: reply.message })
            }
            Err(err) => {
                debug!(%token, error = %err, "Withdrawal not settled, keeping token for retry");
                *self.state.lock() = WithdrawalState::MethodSelected { amount, method, token };
                let outcome = match err {
                    BackendError::Network(_) => Outcome::Rejected,
                    BackendError::Timeout | BackendError::Malformed(_) => Outcome::Unknown,
                };
                self.report(outcome, &err.to_string(), token);
                Err(err.into())
            }
        }
    }

    /// The pending-withdrawals view shown after an accepted request.
    pub async fn pending_withdrawals(&self) -> Result<Vec<WithdrawalRecord>, WithdrawalError> {
        Ok(self.api.pending_withdrawals(self.user_id).await?)
    }

    pub async fn await_reconciliation(&self) -> Option<Result<i64, FetchError>> {
        let handle = self.reconciliation.lock().take()?;
        handle.await.ok()
    }

    fn report(&self, outcome: Outcome, message: &str, token: Uuid) {
        let handle = self.notifier.notify(SettlementEvent {
            kind: SettlementKind::Withdrawal,
            outcome,
            message: message.to_string(),
            token,
        });
        *self.reconciliation.lock() = Some(handle);
    }
}
