use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValidationError;
use crate::market::{MarketId, MarketSession, PanelCatalog, PanelKind, Session};

/// Smallest stake accepted for any wager type.
pub const MIN_STAKE: u64 = 10;

/// Largest single stake; balances are `i64`.
pub const MAX_STAKE: u64 = i64::MAX as u64;

// ============================================================================
// WAGER TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerType {
    Single,
    Jodi,
    SinglePanel,
    DoublePanel,
    TriplePanel,
    HalfSangam,
    FullSangam,
}

impl WagerType {
    /// Wire tag (`bet_type`).
    pub fn tag(&self) -> &'static str {
        match self {
            WagerType::Single => "single",
            WagerType::Jodi => "jodi",
            WagerType::SinglePanel => "single_panel",
            WagerType::DoublePanel => "double_panel",
            WagerType::TriplePanel => "triple_panel",
            WagerType::HalfSangam => "half_sangam",
            WagerType::FullSangam => "full_sangam",
        }
    }

    pub fn shape(&self) -> PayloadShape {
        SHAPE_TABLE
            .iter()
            .find(|(t, _)| t == self)
            .map(|(_, shape)| *shape)
            .unwrap_or(PayloadShape::Digits(1))
    }
}

impl fmt::Display for WagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// SHAPE TABLE
// ============================================================================

/// Payload format required by a wager type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Exactly `n` ASCII numerals.
    Digits(usize),
    /// Three numerals listed in the catalog for this kind.
    Panel(PanelKind),
    /// `D-PPP` or `PPP-D`.
    DigitAndPanel,
    /// `PPP-PPP`.
    PanelPair,
}

pub const SHAPE_TABLE: [(WagerType, PayloadShape); 7] = [
    (WagerType::Single, PayloadShape::Digits(1)),
    (WagerType::Jodi, PayloadShape::Digits(2)),
    (WagerType::SinglePanel, PayloadShape::Panel(PanelKind::Single)),
    (WagerType::DoublePanel, PayloadShape::Panel(PanelKind::Double)),
    (WagerType::TriplePanel, PayloadShape::Panel(PanelKind::Triple)),
    (WagerType::HalfSangam, PayloadShape::DigitAndPanel),
    (WagerType::FullSangam, PayloadShape::PanelPair),
];

fn numerals(s: &str, n: usize) -> bool {
    s.len() == n && s.bytes().all(|b| b.is_ascii_digit())
}

impl PayloadShape {
    pub fn matches(&self, payload: &str, catalog: &PanelCatalog) -> bool {
        let panel = |p: &str| numerals(p, 3) && catalog.is_any_panel(p);
        match self {
            PayloadShape::Digits(n) => numerals(payload, *n),
            PayloadShape::Panel(kind) => numerals(payload, 3) && catalog.contains(*kind, payload),
            PayloadShape::DigitAndPanel => match payload.split_once('-') {
                Some((a, b)) => (numerals(a, 1) && panel(b)) || (panel(a) && numerals(b, 1)),
                None => false,
            },
            PayloadShape::PanelPair => match payload.split_once('-') {
                Some((a, b)) => panel(a) && panel(b),
                None => false,
            },
        }
    }
}

// ============================================================================
// DRAFTS
// ============================================================================

/// User-confirmed entry, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerCandidate {
    pub session: Session,
    pub wager_type: WagerType,
    pub payload: String,
    pub stake: u64,
}

impl WagerCandidate {
    pub fn new(wager_type: WagerType, payload: impl Into<String>, stake: u64, session: Session) -> Self {
        Self {
            session,
            wager_type,
            payload: payload.into(),
            stake,
        }
    }
}

/// A validated wager. Only its session may change after creation, and only
/// through the batch-wide session switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerDraft {
    pub market_id: MarketId,
    pub session: Session,
    pub wager_type: WagerType,
    pub payload: String,
    pub stake: u64,
}

/// Stake, then payload shape, then session availability.
pub fn validate_candidate(
    market: &MarketSession,
    catalog: &PanelCatalog,
    candidate: &WagerCandidate,
) -> Result<WagerDraft, ValidationError> {
    if candidate.stake < MIN_STAKE {
        return Err(ValidationError::InvalidStake {
            stake: candidate.stake,
            min: MIN_STAKE,
        });
    }
    if candidate.stake > MAX_STAKE {
        return Err(ValidationError::StakeTooLarge {
            stake: candidate.stake,
            max: MAX_STAKE,
        });
    }

    let payload = candidate.payload.trim();
    if !candidate.wager_type.shape().matches(payload, catalog) {
        return Err(ValidationError::InvalidDigitShape {
            wager_type: candidate.wager_type,
            payload: candidate.payload.clone(),
        });
    }

    if !market.accepts(candidate.session) {
        return Err(ValidationError::SessionClosed {
            market_id: market.market_id,
            session: candidate.session,
        });
    }

    Ok(WagerDraft {
        market_id: market.market_id,
        session: candidate.session,
        wager_type: candidate.wager_type,
        payload: payload.to_string(),
        stake: candidate.stake,
    })
}
