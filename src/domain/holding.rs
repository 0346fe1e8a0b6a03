//! Holding record: a participant's position in one token within one quest.

use crate::domain::{Decimal, ParticipantId, QuestId, TimeMs, TokenId};
use serde::{Deserialize, Serialize};

/// One ledger row, keyed by (quest, participant, token).
///
/// Rows exist only while quantity > 0; a holding reaching zero quantity is
/// deleted, never stored as a zero row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub quest_id: QuestId,
    pub participant_id: ParticipantId,
    pub token_id: TokenId,
    /// Units held; always > 0, fractional allowed.
    pub quantity: Decimal,
    /// Cumulative amount paid for the current quantity.
    pub total_cost: Decimal,
    /// Price at first acquisition of this token within the quest.
    pub entry_price: Decimal,
    pub updated_ms: TimeMs,
}

impl Holding {
    /// Open a new holding from a first buy.
    pub fn open(
        quest_id: QuestId,
        participant_id: ParticipantId,
        token_id: TokenId,
        quantity: Decimal,
        total_cost: Decimal,
        entry_price: Decimal,
        updated_ms: TimeMs,
    ) -> Self {
        Holding {
            quest_id,
            participant_id,
            token_id,
            quantity,
            total_cost,
            entry_price,
            updated_ms,
        }
    }

    /// Running-average cost per unit (total_cost / quantity).
    pub fn average_cost(&self) -> Decimal {
        self.total_cost / self.quantity
    }
}
