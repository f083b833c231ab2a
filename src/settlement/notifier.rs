//! Output boundary: reports each settlement outcome and kicks off the
//! balance reconciliation that must follow it.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::wallet::{BalanceGuard, FetchError};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementKind {
    Batch,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Accepted,
    Rejected,
    /// Request may or may not have been applied; reconcile before retrying.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementEvent {
    pub kind: SettlementKind,
    pub outcome: Outcome,
    pub message: String,
    pub token: Uuid,
}

pub struct SettlementNotifier {
    guard: Arc<BalanceGuard>,
    events: broadcast::Sender<SettlementEvent>,
}

impl SettlementNotifier {
    pub fn new(guard: Arc<BalanceGuard>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self { guard, events }
    }

    pub fn balance_guard(&self) -> &Arc<BalanceGuard> {
        &self.guard
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettlementEvent> {
        self.events.subscribe()
    }

    /// Publishes `event` and spawns a balance refresh. The refresh is not
    /// awaited here; callers that need the reconciled value await the handle.
    pub fn notify(&self, event: SettlementEvent) -> JoinHandle<Result<i64, FetchError>> {
        match event.outcome {
            Outcome::Accepted => info!(kind = ?event.kind, token = %event.token, message = %event.message, "✅ Settlement accepted"),
            Outcome::Rejected => warn!(kind = ?event.kind, token = %event.token, message = %event.message, "❌ Settlement rejected"),
            Outcome::Unknown => warn!(kind = ?event.kind, token = %event.token, "⚠️ Settlement outcome unknown, reconciling balance"),
        }

        // No subscribers is fine.
        let _ = self.events.send(event);

        let guard = self.guard.clone();
        tokio::spawn(async move { guard.refresh().await })
    }
}
