//! Quest entry record: one row per (quest, participant).

use crate::domain::{Decimal, ParticipantId, QuestId, TimeMs};
use serde::{Deserialize, Serialize};

/// A participant's registration in a quest.
///
/// Created once on join (a participant may join a quest at most once);
/// `final_rank` and `prize_won` are filled by settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestEntry {
    pub quest_id: QuestId,
    pub participant_id: ParticipantId,
    pub joined_ms: TimeMs,
    pub fee_paid: Decimal,
    /// Transaction id returned by the wallet signer, if a fee was paid.
    pub fee_tx_id: Option<String>,
    pub final_rank: Option<u32>,
    pub prize_won: Option<Decimal>,
}

impl QuestEntry {
    /// Create a fresh, unsettled entry.
    pub fn new(
        quest_id: QuestId,
        participant_id: ParticipantId,
        joined_ms: TimeMs,
        fee_paid: Decimal,
        fee_tx_id: Option<String>,
    ) -> Self {
        QuestEntry {
            quest_id,
            participant_id,
            joined_ms,
            fee_paid,
            fee_tx_id,
            final_rank: None,
            prize_won: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_new_entry_is_unsettled() {
        let entry = QuestEntry::new(
            QuestId::new("q1".to_string()),
            ParticipantId::new("alice".to_string()),
            TimeMs::new(500),
            Decimal::from_str("5").unwrap(),
            Some("tx-1".to_string()),
        );
        assert!(entry.final_rank.is_none());
        assert!(entry.prize_won.is_none());
    }
}
