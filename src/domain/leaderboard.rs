//! Leaderboard entry: the computed, ranked view produced by settlement.

use crate::domain::{Decimal, ParticipantId};
use serde::{Deserialize, Serialize};

/// One ranked row of a quest leaderboard.
///
/// Derived, not a source of truth: re-running settlement over the same
/// holdings and snapshots reproduces the same entries in the same order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based dense rank.
    pub rank: u32,
    pub participant_id: ParticipantId,
    /// Sum of cost bases across final holdings.
    pub total_investment: Decimal,
    /// Sum of end-of-window values across final holdings.
    pub total_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub prize_won: Decimal,
    /// True when any holding was valued off a missing or unavailable
    /// snapshot, or when the quest has not ended yet.
    pub provisional: bool,
}
