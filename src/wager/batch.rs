//! Incrementally built wager batch for one market.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::types::{validate_candidate, WagerCandidate, WagerDraft};
use super::{IndexError, ValidationError};
use crate::backend::{BidLine, BidSubmission, UserId};
use crate::market::{MarketSession, PanelCatalog, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchTotals {
    pub count: usize,
    pub total_stake: u64,
}

/// Ordered drafts against a single market.
///
/// Balance is not consulted here; funds are checked only at
/// submission. The idempotency token changes whenever the contents change and
/// is stable across retries of an unchanged batch.
#[derive(Debug, Clone)]
pub struct WagerBatch {
    market: MarketSession,
    catalog: Arc<PanelCatalog>,
    session: Session,
    drafts: Vec<WagerDraft>,
    token: Uuid,
}

impl WagerBatch {
    pub fn new(market: MarketSession, catalog: Arc<PanelCatalog>) -> Self {
        let session = market.default_session();
        Self {
            market,
            catalog,
            session,
            drafts: Vec::new(),
            token: Uuid::new_v4(),
        }
    }

    pub fn market(&self) -> &MarketSession {
        &self.market
    }

    /// Current value of the batch-wide session selector.
    pub fn session(&self) -> Session {
        self.session
    }

    pub fn drafts(&self) -> &[WagerDraft] {
        &self.drafts
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn idempotency_token(&self) -> Uuid {
        self.token
    }

    pub fn add_draft(&mut self, candidate: WagerCandidate) -> Result<(), ValidationError> {
        let draft = validate_candidate(&self.market, &self.catalog, &candidate)?;
        debug!(
            market_id = draft.market_id,
            bet_type = %draft.wager_type,
            digit = %draft.payload,
            stake = draft.stake,
            "Bid added to batch"
        );
        self.drafts.push(draft);
        self.touch();
        Ok(())
    }

    pub fn remove_draft(&mut self, index: usize) -> Result<WagerDraft, IndexError> {
        if index >= self.drafts.len() {
            return Err(IndexError {
                index,
                len: self.drafts.len(),
            });
        }
        let removed = self.drafts.remove(index);
        self.touch();
        Ok(removed)
    }

    /// Moves every pending draft to `session` and makes it the selector value.
    pub fn set_session_for_all(&mut self, session: Session) {
        self.session = session;
        for draft in &mut self.drafts {
            draft.session = session;
        }
        self.touch();
    }

    pub fn totals(&self) -> BatchTotals {
        BatchTotals {
            count: self.drafts.len(),
            // Saturates; a saturated total is never covered by any balance.
            total_stake: self
                .drafts
                .iter()
                .fold(0u64, |acc, d| acc.saturating_add(d.stake)),
        }
    }

    pub fn to_submission(&self, user_id: UserId) -> BidSubmission {
        BidSubmission {
            idempotency_key: self.token,
            bids: self
                .drafts
                .iter()
                .map(|d| BidLine {
                    market_id: d.market_id,
                    market_session: d.session,
                    bet_type: d.wager_type,
                    bet_digit: d.payload.clone(),
                    bet_amount: d.stake,
                    user_id,
                })
                .collect(),
        }
    }

    /// Only called after a confirmed acceptance.
    pub(crate) fn clear(&mut self) {
        self.drafts.clear();
        self.touch();
    }

    fn touch(&mut self) {
        self.token = Uuid::new_v4();
    }
}
