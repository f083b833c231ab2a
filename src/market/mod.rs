//! Market snapshots and session availability.
//!
//! A [`MarketSession`] is a read-only view of one market as published by the
//! market-listing collaborator. Nothing in this crate mutates a snapshot in
//! place: a fresh listing replaces the old one wholesale.

pub mod panel;

pub use panel::{PanelCatalog, PanelKind};

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Market identifier as issued by the listing collaborator.
pub type MarketId = u64;

// ============================================================================
// SESSION
// ============================================================================

/// Which betting window a wager targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Session {
    Open,
    Close,
}

impl Session {
    pub fn as_str(&self) -> &'static str {
        match self {
            Session::Open => "open",
            Session::Close => "close",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MARKET SESSION
// ============================================================================

/// One entry of the market listing.
///
/// Serde names follow the listing payload (`open_market_status` etc. are 0/1
/// integers on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSession {
    pub market_id: MarketId,
    #[serde(rename = "market_name")]
    pub name: String,
    #[serde(rename = "open_market_status", with = "status_flag")]
    pub open_active: bool,
    #[serde(rename = "close_market_status", with = "status_flag")]
    pub close_active: bool,
    /// `HH:MM`, market local time
    #[serde(rename = "market_open_time")]
    pub open_time: String,
    /// `HH:MM`, market local time
    #[serde(rename = "market_close_time")]
    pub close_time: String,
}

impl MarketSession {
    /// Whether a wager naming `session` may be constructed right now.
    ///
    /// Open requires the open window. Close is offered whenever the market is
    /// running at all, even after the open window has lapsed.
    pub fn accepts(&self, session: Session) -> bool {
        match session {
            Session::Open => self.open_active,
            Session::Close => self.is_running(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.open_active || self.close_active
    }

    /// Session a freshly created batch starts on.
    pub fn default_session(&self) -> Session {
        if self.open_active {
            Session::Open
        } else {
            Session::Close
        }
    }

    /// Sessions currently offered to the user, in display order.
    pub fn offered_sessions(&self) -> Vec<Session> {
        [Session::Open, Session::Close]
            .into_iter()
            .filter(|s| self.accepts(*s))
            .collect()
    }
}

mod status_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flag: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*flag))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Int(i64),
            Bool(bool),
        }
        Ok(match Flag::deserialize(d)? {
            Flag::Int(v) => v == 1,
            Flag::Bool(b) => b,
        })
    }
}

// ============================================================================
// REGISTRY (ledger side)
// ============================================================================

/// Current market snapshots held by the ledger.
///
/// Snapshots are replaced, never edited.
#[derive(Debug, Default)]
pub struct MarketRegistry {
    markets: RwLock<HashMap<MarketId, MarketSession>>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, market_id: MarketId) -> Option<MarketSession> {
        self.markets.read().get(&market_id).cloned()
    }

    pub fn upsert(&self, market: MarketSession) {
        self.markets.write().insert(market.market_id, market);
    }

    pub fn replace_all(&self, markets: Vec<MarketSession>) {
        let fresh = markets.into_iter().map(|m| (m.market_id, m)).collect();
        *self.markets.write() = fresh;
    }

    /// Listing ordered by market id.
    pub fn list(&self) -> Vec<MarketSession> {
        let mut all: Vec<_> = self.markets.read().values().cloned().collect();
        all.sort_by_key(|m| m.market_id);
        all
    }
}
