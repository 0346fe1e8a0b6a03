//! Price snapshot record: a quest's reference price for one token.

use crate::domain::{Decimal, QuestId, TimeMs, TokenId};
use serde::{Deserialize, Serialize};

/// Recorded start/end reference prices for (quest, token).
///
/// Created in bulk at the Upcoming->Active transition; `end_price` stays
/// NULL until the Active->Ended transition fills it. Neither field is ever
/// overwritten once set, so settlement is reproducible from any process.
/// `start_price = None` means the token's base price was unavailable at
/// activation and holdings in it are valued at cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub quest_id: QuestId,
    pub token_id: TokenId,
    pub start_price: Option<Decimal>,
    pub end_price: Option<Decimal>,
    pub snapped_ms: TimeMs,
    pub updated_ms: TimeMs,
}

impl PriceSnapshot {
    /// Create a start-of-window snapshot (end price unfilled).
    pub fn at_start(
        quest_id: QuestId,
        token_id: TokenId,
        start_price: Option<Decimal>,
        snapped_ms: TimeMs,
    ) -> Self {
        PriceSnapshot {
            quest_id,
            token_id,
            start_price,
            end_price: None,
            snapped_ms,
            updated_ms: snapped_ms,
        }
    }
}
