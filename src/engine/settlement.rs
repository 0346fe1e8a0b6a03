//! Settlement & ranking: value final holdings off the snapshot trajectory,
//! rank by realized return, and allocate the prize pool.

use crate::domain::{Decimal, Holding, LeaderboardEntry, ParticipantId, TimeMs, TokenId};
use std::collections::BTreeMap;

/// A participant's final state going into settlement.
#[derive(Debug, Clone)]
pub struct ParticipantHoldings {
    pub participant_id: ParticipantId,
    pub joined_ms: TimeMs,
    pub holdings: Vec<Holding>,
}

/// Prize allocation as a pure function of rank and pool.
///
/// Injected so the engine never hard-codes a payout scheme.
pub trait PrizePolicy: Send + Sync {
    fn prize_for(&self, rank: u32, pool: Decimal) -> Decimal;
}

/// Pays fixed percentages of the pool to the top ranks (default 50/30/20).
#[derive(Debug, Clone)]
pub struct PodiumSplit {
    splits: Vec<Decimal>,
}

impl PodiumSplit {
    /// Create from percentage splits by rank (index 0 = rank 1).
    pub fn new(splits: Vec<Decimal>) -> Self {
        PodiumSplit { splits }
    }
}

impl Default for PodiumSplit {
    fn default() -> Self {
        PodiumSplit::new(vec![
            Decimal::from_str_canonical("50").expect("literal"),
            Decimal::from_str_canonical("30").expect("literal"),
            Decimal::from_str_canonical("20").expect("literal"),
        ])
    }
}

impl PrizePolicy for PodiumSplit {
    fn prize_for(&self, rank: u32, pool: Decimal) -> Decimal {
        match self.splits.get((rank as usize).saturating_sub(1)) {
            Some(pct) => pool * *pct / Decimal::hundred(),
            None => Decimal::zero(),
        }
    }
}

struct Valued {
    participant_id: ParticipantId,
    joined_ms: TimeMs,
    total_investment: Decimal,
    total_value: Decimal,
    pnl_percent: Decimal,
    provisional: bool,
}

/// Value one participant's holdings off the two price maps.
///
/// `start_value = total_cost` (the amount actually invested); each token's
/// end value follows the snapshot trajectory. A token missing either price
/// is valued at cost and marks the result provisional; settlement never
/// blocks on a single token's missing data.
fn value_participant(
    input: &ParticipantHoldings,
    start_prices: &BTreeMap<TokenId, Decimal>,
    end_prices: &BTreeMap<TokenId, Decimal>,
) -> Valued {
    let mut total_investment = Decimal::zero();
    let mut total_value = Decimal::zero();
    let mut provisional = false;

    for holding in &input.holdings {
        let start_value = holding.total_cost;
        total_investment = total_investment + start_value;

        let trajectory = match (
            start_prices.get(&holding.token_id),
            end_prices.get(&holding.token_id),
        ) {
            (Some(start), Some(end)) if start.is_positive() => {
                Some((*end - *start) / *start * Decimal::hundred())
            }
            _ => None,
        };

        match trajectory {
            Some(pnl_pct) => {
                let end_value = start_value * (Decimal::one() + pnl_pct / Decimal::hundred());
                total_value = total_value + end_value;
            }
            None => {
                // fallback valuation at last known value
                total_value = total_value + start_value;
                provisional = true;
            }
        }
    }

    let pnl = total_value - total_investment;
    let pnl_percent = if total_investment.is_zero() {
        Decimal::zero()
    } else {
        pnl / total_investment * Decimal::hundred()
    };

    Valued {
        participant_id: input.participant_id.clone(),
        joined_ms: input.joined_ms,
        total_investment,
        total_value,
        pnl_percent,
        provisional,
    }
}

/// Settle a quest: value, rank, and allocate prizes.
///
/// Ordering is deterministic: participants who traded rank before those who
/// never bought anything; within a group, pnl percent descending, then
/// earlier join time, then participant id ascending. Ranks are dense from 1.
pub fn settle(
    participants: &[ParticipantHoldings],
    start_prices: &BTreeMap<TokenId, Decimal>,
    end_prices: &BTreeMap<TokenId, Decimal>,
    prize_pool: Decimal,
    policy: &dyn PrizePolicy,
) -> Vec<LeaderboardEntry> {
    let mut valued: Vec<Valued> = participants
        .iter()
        .map(|p| value_participant(p, start_prices, end_prices))
        .collect();

    valued.sort_by(|a, b| {
        let a_traded = !a.total_investment.is_zero();
        let b_traded = !b.total_investment.is_zero();
        b_traded
            .cmp(&a_traded)
            .then_with(|| b.pnl_percent.cmp(&a.pnl_percent))
            .then_with(|| a.joined_ms.cmp(&b.joined_ms))
            .then_with(|| a.participant_id.cmp(&b.participant_id))
    });

    valued
        .into_iter()
        .enumerate()
        .map(|(idx, v)| {
            let rank = (idx + 1) as u32;
            LeaderboardEntry {
                rank,
                participant_id: v.participant_id,
                total_investment: v.total_investment,
                total_value: v.total_value,
                pnl: v.total_value - v.total_investment,
                pnl_percent: v.pnl_percent,
                prize_won: policy.prize_for(rank, prize_pool),
                provisional: v.provisional,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QuestId, TimeMs};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn token(s: &str) -> TokenId {
        TokenId::new(s.to_string())
    }

    fn holding(pid: &str, tok: &str, qty: &str, cost: &str) -> Holding {
        Holding::open(
            QuestId::new("q1".to_string()),
            ParticipantId::new(pid.to_string()),
            token(tok),
            dec(qty),
            dec(cost),
            dec(cost) / dec(qty),
            TimeMs::new(0),
        )
    }

    fn participant(pid: &str, joined: i64, holdings: Vec<Holding>) -> ParticipantHoldings {
        ParticipantHoldings {
            participant_id: ParticipantId::new(pid.to_string()),
            joined_ms: TimeMs::new(joined),
            holdings,
        }
    }

    fn prices(entries: &[(&str, &str)]) -> BTreeMap<TokenId, Decimal> {
        entries.iter().map(|(t, p)| (token(t), dec(p))).collect()
    }

    #[test]
    fn test_scenario_a_single_holding_twenty_percent() {
        // 10 units of X bought at $1 (cost $10), end price $1.20
        let participants = vec![participant("alice", 0, vec![holding("alice", "X", "10", "10")])];
        let start = prices(&[("X", "1")]);
        let end = prices(&[("X", "1.2")]);

        let board = settle(&participants, &start, &end, dec("100"), &PodiumSplit::default());

        assert_eq!(board.len(), 1);
        let e = &board[0];
        assert_eq!(e.rank, 1);
        assert_eq!(e.total_value, dec("12"));
        assert_eq!(e.pnl, dec("2"));
        assert_eq!(e.pnl_percent, dec("20"));
        assert_eq!(e.prize_won, dec("50"));
        assert!(!e.provisional);
    }

    #[test]
    fn test_zero_investment_ranks_below_negative_return() {
        let participants = vec![
            participant("idle", 0, vec![]),
            participant("loser", 10, vec![holding("loser", "X", "10", "10")]),
        ];
        let start = prices(&[("X", "1")]);
        let end = prices(&[("X", "0.8")]);

        let board = settle(&participants, &start, &end, dec("0"), &PodiumSplit::default());

        assert_eq!(board[0].participant_id.as_str(), "loser");
        assert_eq!(board[0].pnl_percent, dec("-20"));
        assert_eq!(board[1].participant_id.as_str(), "idle");
        // defined as 0, never NaN
        assert_eq!(board[1].pnl_percent, dec("0"));
        assert_eq!(board[1].rank, 2);
    }

    #[test]
    fn test_exact_tie_breaks_on_join_time_then_id() {
        let participants = vec![
            participant("bob", 200, vec![holding("bob", "X", "10", "10")]),
            participant("alice", 100, vec![holding("alice", "X", "5", "5")]),
        ];
        let start = prices(&[("X", "1")]);
        let end = prices(&[("X", "1.2")]);

        let board = settle(&participants, &start, &end, dec("0"), &PodiumSplit::default());

        // both +20%: earlier join wins rank 1
        assert_eq!(board[0].participant_id.as_str(), "alice");
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].participant_id.as_str(), "bob");
        assert_eq!(board[1].rank, 2);

        // same join time: id ascending decides
        let participants = vec![
            participant("bob", 100, vec![holding("bob", "X", "10", "10")]),
            participant("alice", 100, vec![holding("alice", "X", "5", "5")]),
        ];
        let board = settle(&participants, &start, &end, dec("0"), &PodiumSplit::default());
        assert_eq!(board[0].participant_id.as_str(), "alice");
    }

    #[test]
    fn test_missing_end_price_degrades_to_provisional() {
        let participants = vec![participant(
            "alice",
            0,
            vec![
                holding("alice", "X", "10", "10"),
                holding("alice", "Y", "2", "8"),
            ],
        )];
        let start = prices(&[("X", "1"), ("Y", "4")]);
        let end = prices(&[("X", "1.5")]); // Y missing

        let board = settle(&participants, &start, &end, dec("0"), &PodiumSplit::default());

        let e = &board[0];
        // X appreciates 50%, Y held at cost
        assert_eq!(e.total_value, dec("23"));
        assert!(e.provisional);
    }

    #[test]
    fn test_settle_is_deterministic() {
        let participants = vec![
            participant("a", 1, vec![holding("a", "X", "1", "1")]),
            participant("b", 2, vec![holding("b", "Y", "2", "6")]),
            participant("c", 3, vec![]),
        ];
        let start = prices(&[("X", "1"), ("Y", "3")]);
        let end = prices(&[("X", "2"), ("Y", "2")]);

        let one = settle(&participants, &start, &end, dec("10"), &PodiumSplit::default());
        let two = settle(&participants, &start, &end, dec("10"), &PodiumSplit::default());
        assert_eq!(one, two);
    }

    #[test]
    fn test_ranks_dense_from_one() {
        let participants = vec![
            participant("a", 1, vec![holding("a", "X", "1", "1")]),
            participant("b", 2, vec![holding("b", "X", "1", "1")]),
            participant("c", 3, vec![holding("c", "X", "1", "1")]),
        ];
        let start = prices(&[("X", "1")]);
        let end = prices(&[("X", "1.1")]);

        let board = settle(&participants, &start, &end, dec("0"), &PodiumSplit::default());
        let ranks: Vec<u32> = board.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_podium_split_allocation() {
        let policy = PodiumSplit::default();
        let pool = dec("1000");
        assert_eq!(policy.prize_for(1, pool), dec("500"));
        assert_eq!(policy.prize_for(2, pool), dec("300"));
        assert_eq!(policy.prize_for(3, pool), dec("200"));
        assert_eq!(policy.prize_for(4, pool), dec("0"));
    }
}
