//! Withdrawal Gate
//!
//! Validates a single outbound withdrawal and submits one debit-intent
//! request. Amount checks run in a fixed order and the first failure wins:
//!
//! 1. time-of-day window
//! 2. numeric validity
//! 3. positivity
//! 4. sufficiency against balance
//! 5. configured min/max
//!
//! so an out-of-window request always reports the window, whatever else is
//! wrong with it.

pub mod gate;
pub mod payout;

pub use gate::{GateContext, NextView, WithdrawalGate, WithdrawalReceipt, WithdrawalState};
pub use payout::{
    validate_bank_details, validate_ifsc, validate_upi_numbers, PayoutMethod, PayoutMethodKind,
    PayoutProfile, RegistrationError,
};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::wallet::{covers, FetchError};

/// India Standard Time, in minutes east of UTC.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WithdrawalError {
    #[error("Withdrawals are allowed between {open} and {close}")]
    OutsideWindow { open: String, close: String },

    #[error("Enter valid amount")]
    NotANumber,

    #[error("Enter valid amount")]
    NotPositive,

    #[error("Insufficient wallet balance.")]
    InsufficientBalance { available: i64, requested: u64 },

    #[error("Withdraw amount must be between {min} and {max}")]
    OutOfBounds { min: u64, max: u64, requested: u64 },

    #[error("Enter an amount first")]
    AmountNotEntered,

    #[error("Add bank details first")]
    NoPayoutMethod,

    #[error("Payout method {0} is not registered")]
    MethodNotRegistered(PayoutMethodKind),

    #[error("Please select a withdrawal method.")]
    NoMethodSelected,

    #[error("A withdrawal is already in progress")]
    InProgress,

    #[error(transparent)]
    BalanceUnavailable(#[from] FetchError),

    #[error("{message}")]
    Rejected { message: String },

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Withdrawal timed out; refresh your balance before retrying")]
    Timeout,

    #[error("Unreadable withdrawal response ({0}); refresh your balance before retrying")]
    Ambiguous(String),
}

impl WithdrawalError {
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, WithdrawalError::Timeout | WithdrawalError::Ambiguous(_))
    }
}

/// Terminal short-circuits: the gate is never offered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateDisabled {
    #[error("Withdrawals are not enabled for this account")]
    NotPermitted,

    #[error("No balance available to withdraw")]
    NoBalance,
}

// ============================================================================
// POLICY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalPolicy {
    pub min_amount: u64,
    pub max_amount: u64,
    /// `HH:MM`, inclusive
    pub open_time: String,
    /// `HH:MM`, exclusive
    pub close_time: String,
    pub utc_offset_minutes: i32,
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self {
            min_amount: 1000,
            max_amount: 50_000,
            // Unconfigured window: open == close, i.e. always closed.
            open_time: "10:00".to_string(),
            close_time: "10:00".to_string(),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

impl WithdrawalPolicy {
    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Zero-padded `HH:MM` at the policy's offset.
    pub fn local_time(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.offset()).format("%H:%M").to_string()
    }

    /// `open <= now < close`, compared as strings. A window that would wrap
    /// past midnight is never open.
    pub fn window_open(&self, now: DateTime<Utc>) -> bool {
        let t = self.local_time(now);
        t.as_str() >= self.open_time.as_str() && t.as_str() < self.close_time.as_str()
    }

    pub fn validate(&self, amount_text: &str, balance: i64, now: DateTime<Utc>) -> Result<u64, WithdrawalError> {
        if !self.window_open(now) {
            return Err(WithdrawalError::OutsideWindow {
                open: self.open_time.clone(),
                close: self.close_time.clone(),
            });
        }

        let amount: i64 = amount_text
            .trim()
            .parse()
            .map_err(|_| WithdrawalError::NotANumber)?;

        if amount <= 0 {
            return Err(WithdrawalError::NotPositive);
        }
        let amount = amount as u64;

        if !covers(balance, amount) {
            return Err(WithdrawalError::InsufficientBalance {
                available: balance,
                requested: amount,
            });
        }

        if amount < self.min_amount || amount > self.max_amount {
            return Err(WithdrawalError::OutOfBounds {
                min: self.min_amount,
                max: self.max_amount,
                requested: amount,
            });
        }

        Ok(amount)
    }
}
