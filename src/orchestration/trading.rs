//! Quest service: the caller-facing operations (create/join/buy/sell/views).
//!
//! Every gate re-reads the quest's timestamps from the store at call time;
//! the stored status column is a cache and is never trusted for decisions.

use crate::db::Repository;
use crate::domain::{
    Decimal, Holding, LeaderboardEntry, ParticipantId, Quest, QuestEntry, QuestId, QuestStatus,
    QuestValidationError, TimeMs, TokenId,
};
use crate::engine::ledger::{apply_buy, apply_sell, LedgerError, SellResult};
use crate::engine::settlement::{settle, ParticipantHoldings, PrizePolicy};
use crate::oracle::{OracleError, PriceOracle};
use crate::signer::{TransferError, TransferRequest, WalletSigner};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Caller-facing error taxonomy: validation, state, not-found, and
/// collaborator failures are distinct kinds so callers can tell "not yet"
/// from "never will be".
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("{0}")]
    Validation(String),
    #[error("Quest not found: {0}")]
    QuestNotFound(String),
    #[error("Participant {participant} has not joined quest {quest}")]
    NotAParticipant { quest: String, participant: String },
    #[error("No holding in token {token} for participant {participant}")]
    HoldingNotFound { participant: String, token: String },
    #[error("Registration closed for quest {0}: the trading window has started")]
    RegistrationClosed(String),
    #[error("Quest {quest} is not accepting trades: status is {status}")]
    TradingClosed { quest: String, status: QuestStatus },
    #[error("Quest {0} is full")]
    QuestFull(String),
    #[error("Participant {participant} already joined quest {quest}")]
    AlreadyJoined { quest: String, participant: String },
    #[error(transparent)]
    Store(#[from] sqlx::Error),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl From<QuestValidationError> for TradeError {
    fn from(err: QuestValidationError) -> Self {
        TradeError::Validation(err.to_string())
    }
}

impl From<LedgerError> for TradeError {
    fn from(err: LedgerError) -> Self {
        TradeError::Validation(err.to_string())
    }
}

/// A holding decorated with its current valuation for the portfolio view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuedHolding {
    pub holding: Holding,
    /// Current reference price, None when no price could be resolved
    /// (the holding is then valued at cost).
    pub current_price: Option<Decimal>,
    pub current_value: Decimal,
}

/// Parameters for quest creation.
#[derive(Debug, Clone)]
pub struct NewQuest {
    pub name: String,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
    pub max_participants: Option<u32>,
    pub tokens: Vec<TokenId>,
}

pub struct QuestService {
    repo: Arc<Repository>,
    oracle: Arc<dyn PriceOracle>,
    signer: Arc<dyn WalletSigner>,
    prize_policy: Arc<dyn PrizePolicy>,
    treasury_address: String,
    /// Serializes ledger read-modify-write sequences. Coarse (one writer
    /// across all holdings) but sufficient at competition scale; per-key
    /// ordering follows from it.
    ledger_guard: tokio::sync::Mutex<()>,
}

impl QuestService {
    pub fn new(
        repo: Arc<Repository>,
        oracle: Arc<dyn PriceOracle>,
        signer: Arc<dyn WalletSigner>,
        prize_policy: Arc<dyn PrizePolicy>,
        treasury_address: String,
    ) -> Self {
        Self {
            repo,
            oracle,
            signer,
            prize_policy,
            treasury_address,
            ledger_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a quest. Start/end are immutable afterwards.
    pub async fn create_quest(&self, params: NewQuest) -> Result<Quest, TradeError> {
        let quest = Quest::new(
            params.name,
            params.entry_fee,
            params.prize_pool,
            params.start_ms,
            params.end_ms,
            params.max_participants,
            params.tokens,
            TimeMs::now(),
        )?;

        self.repo.insert_quest(&quest).await?;
        info!(quest = %quest.id, name = %quest.name, "Quest created");
        Ok(quest)
    }

    /// Load a quest or fail with QuestNotFound.
    pub async fn get_quest(&self, quest_id: &QuestId) -> Result<Quest, TradeError> {
        self.repo
            .get_quest(quest_id)
            .await?
            .ok_or_else(|| TradeError::QuestNotFound(quest_id.as_str().to_string()))
    }

    /// List all quests.
    pub async fn list_quests(&self) -> Result<Vec<Quest>, TradeError> {
        Ok(self.repo.list_quests().await?)
    }

    /// Join a quest while it is still Upcoming.
    ///
    /// Pays the entry fee through the wallet signer before any record is
    /// written; a failed transfer aborts the join with no mutation. A join
    /// arriving at or after the start instant is rejected with
    /// RegistrationClosed regardless of any cached status.
    pub async fn join(
        &self,
        quest_id: &QuestId,
        participant_id: &ParticipantId,
        now: TimeMs,
    ) -> Result<QuestEntry, TradeError> {
        let quest = self.get_quest(quest_id).await?;

        if quest.status_at(now) != QuestStatus::Upcoming {
            return Err(TradeError::RegistrationClosed(quest_id.as_str().to_string()));
        }

        if self.repo.get_entry(quest_id, participant_id).await?.is_some() {
            return Err(TradeError::AlreadyJoined {
                quest: quest_id.as_str().to_string(),
                participant: participant_id.as_str().to_string(),
            });
        }

        if let Some(max) = quest.max_participants {
            if quest.participant_count >= max {
                return Err(TradeError::QuestFull(quest_id.as_str().to_string()));
            }
        }

        // pay first, record second
        let fee_tx_id = if quest.entry_fee.is_positive() {
            let receipt = self
                .signer
                .transfer(&TransferRequest {
                    amount: quest.entry_fee,
                    from: participant_id.as_str().to_string(),
                    to: self.treasury_address.clone(),
                    memo: format!("entry-fee:{}", quest_id),
                })
                .await?;
            Some(receipt.tx_id)
        } else {
            None
        };

        // capacity claim is conditional in the store, so racing joins
        // cannot exceed max_participants
        if !self.repo.try_increment_participant_count(quest_id).await? {
            if let Some(tx_id) = &fee_tx_id {
                warn!(quest = %quest_id, participant = %participant_id, fee_tx = %tx_id,
                    "Join lost the capacity race after the entry fee was paid; fee needs refund");
            }
            return Err(TradeError::QuestFull(quest_id.as_str().to_string()));
        }

        let entry = QuestEntry::new(
            quest_id.clone(),
            participant_id.clone(),
            now,
            quest.entry_fee,
            fee_tx_id,
        );

        if !self.repo.insert_entry(&entry).await? {
            // a racing join for the same participant landed between the
            // pre-check and this insert; give the claimed slot back so the
            // count stays equal to the number of entry rows
            self.repo.release_participant_slot(quest_id).await?;
            if let Some(tx_id) = &entry.fee_tx_id {
                warn!(quest = %quest_id, participant = %participant_id, fee_tx = %tx_id,
                    "Duplicate join detected after the entry fee was paid; fee needs refund");
            }
            return Err(TradeError::AlreadyJoined {
                quest: quest_id.as_str().to_string(),
                participant: participant_id.as_str().to_string(),
            });
        }

        info!(quest = %quest_id, participant = %participant_id, "Participant joined");
        Ok(entry)
    }

    /// Buy `quantity` units of a token at the current reference price.
    pub async fn buy(
        &self,
        quest_id: &QuestId,
        participant_id: &ParticipantId,
        token: &TokenId,
        quantity: Decimal,
        now: TimeMs,
    ) -> Result<Holding, TradeError> {
        if !quantity.is_positive() {
            return Err(TradeError::Validation(format!(
                "Quantity must be > 0, got {}",
                quantity
            )));
        }

        let quest = self.get_quest(quest_id).await?;
        self.require_active(&quest, now)?;

        if !quest.allows_token(token) {
            return Err(TradeError::Validation(format!(
                "Token {} is not tradable in quest {}",
                token, quest_id
            )));
        }

        if self.repo.get_entry(quest_id, participant_id).await?.is_none() {
            return Err(TradeError::NotAParticipant {
                quest: quest_id.as_str().to_string(),
                participant: participant_id.as_str().to_string(),
            });
        }

        let price = self.oracle.price(token).await?;
        self.repo.upsert_reference_price(token, price, now).await?;

        let _guard = self.ledger_guard.lock().await;
        let existing = self.repo.get_holding(quest_id, participant_id, token).await?;
        let holding = apply_buy(existing, quest_id, participant_id, token, quantity, price, now)?;
        self.repo.upsert_holding(&holding).await?;

        info!(
            quest = %quest_id,
            participant = %participant_id,
            token = %token,
            quantity = %quantity,
            price = %price,
            "Buy recorded"
        );
        Ok(holding)
    }

    /// Sell `quantity` units of a held token.
    ///
    /// Oversized requests clamp to the held quantity; the result reports
    /// the actually-sold amount so callers can detect a partial fill.
    pub async fn sell(
        &self,
        quest_id: &QuestId,
        participant_id: &ParticipantId,
        token: &TokenId,
        quantity: Decimal,
        now: TimeMs,
    ) -> Result<SellResult, TradeError> {
        if !quantity.is_positive() {
            return Err(TradeError::Validation(format!(
                "Quantity must be > 0, got {}",
                quantity
            )));
        }

        let quest = self.get_quest(quest_id).await?;
        self.require_active(&quest, now)?;

        let _guard = self.ledger_guard.lock().await;
        let holding = self
            .repo
            .get_holding(quest_id, participant_id, token)
            .await?
            .ok_or_else(|| TradeError::HoldingNotFound {
                participant: participant_id.as_str().to_string(),
                token: token.as_str().to_string(),
            })?;

        let result = apply_sell(holding, quantity, now)?;
        match &result.remaining {
            Some(updated) => self.repo.upsert_holding(updated).await?,
            None => {
                self.repo.delete_holding(quest_id, participant_id, token).await?;
            }
        }

        info!(
            quest = %quest_id,
            participant = %participant_id,
            token = %token,
            sold = %result.sold,
            closed = result.remaining.is_none(),
            "Sell recorded"
        );
        Ok(result)
    }

    /// A participant's holdings valued at current reference prices.
    pub async fn portfolio(
        &self,
        quest_id: &QuestId,
        participant_id: &ParticipantId,
        now: TimeMs,
    ) -> Result<Vec<ValuedHolding>, TradeError> {
        let quest = self.get_quest(quest_id).await?;
        if self.repo.get_entry(quest_id, participant_id).await?.is_none() {
            return Err(TradeError::NotAParticipant {
                quest: quest_id.as_str().to_string(),
                participant: participant_id.as_str().to_string(),
            });
        }

        let holdings = self.repo.list_holdings(quest_id, participant_id).await?;
        let tokens: Vec<TokenId> = holdings.iter().map(|h| h.token_id.clone()).collect();
        let prices = self.current_prices(&quest, &tokens, now).await?;

        Ok(holdings
            .into_iter()
            .map(|holding| {
                let current_price = prices.get(&holding.token_id).copied();
                let current_value = match current_price {
                    Some(price) => holding.quantity * price,
                    // last-known valuation: the amount invested
                    None => holding.total_cost,
                };
                ValuedHolding {
                    holding,
                    current_price,
                    current_value,
                }
            })
            .collect())
    }

    /// Quest leaderboard.
    ///
    /// Ended quests return the settled, deterministic ranking; quests still
    /// in (or before) the window return live standings valued at current
    /// prices with every entry marked provisional. No prize is reported
    /// until settlement awards one.
    pub async fn leaderboard(
        &self,
        quest_id: &QuestId,
        now: TimeMs,
    ) -> Result<Vec<LeaderboardEntry>, TradeError> {
        let quest = self.get_quest(quest_id).await?;
        let entries = self.repo.list_entries(quest_id).await?;
        let holdings = self.repo.list_holdings_for_quest(quest_id).await?;
        let participants = group_by_participant(&entries, holdings);

        let snapshots = self.repo.list_snapshots(quest_id).await?;
        let start_prices: BTreeMap<TokenId, Decimal> = snapshots
            .iter()
            .filter_map(|s| s.start_price.map(|p| (s.token_id.clone(), p)))
            .collect();

        if quest.status_at(now) == QuestStatus::Ended {
            let end_prices: BTreeMap<TokenId, Decimal> = snapshots
                .iter()
                .filter_map(|s| s.end_price.map(|p| (s.token_id.clone(), p)))
                .collect();
            return Ok(settle(
                &participants,
                &start_prices,
                &end_prices,
                quest.prize_pool,
                self.prize_policy.as_ref(),
            ));
        }

        // live standings: value against current prices, everything provisional
        let tokens: Vec<TokenId> = participants
            .iter()
            .flat_map(|p| p.holdings.iter().map(|h| h.token_id.clone()))
            .collect();
        let current = self.current_prices(&quest, &tokens, now).await?;

        let mut board = settle(
            &participants,
            &start_prices,
            &current,
            quest.prize_pool,
            self.prize_policy.as_ref(),
        );
        for entry in &mut board {
            entry.provisional = true;
            // prizes exist only once settlement commits them
            entry.prize_won = Decimal::zero();
        }
        Ok(board)
    }

    fn require_active(&self, quest: &Quest, now: TimeMs) -> Result<(), TradeError> {
        match quest.status_at(now) {
            QuestStatus::Active => Ok(()),
            status => Err(TradeError::TradingClosed {
                quest: quest.id.as_str().to_string(),
                status,
            }),
        }
    }

    /// Resolve current prices for a token set: oracle first, then the start
    /// snapshot, else absent (callers value such holdings at cost).
    async fn current_prices(
        &self,
        quest: &Quest,
        tokens: &[TokenId],
        now: TimeMs,
    ) -> Result<BTreeMap<TokenId, Decimal>, TradeError> {
        let mut unique: Vec<TokenId> = tokens.to_vec();
        unique.sort();
        unique.dedup();

        let reads = join_all(unique.iter().map(|token| self.oracle.price(token))).await;

        let snapshots = self.repo.list_snapshots(&quest.id).await?;
        let mut prices = BTreeMap::new();

        for (token, read) in unique.into_iter().zip(reads) {
            match read {
                Ok(price) => {
                    self.repo.upsert_reference_price(&token, price, now).await?;
                    prices.insert(token, price);
                }
                Err(e) => {
                    warn!(token = %token, error = %e, "Oracle read failed, falling back to start snapshot");
                    if let Some(start) = snapshots
                        .iter()
                        .find(|s| s.token_id == token)
                        .and_then(|s| s.start_price)
                    {
                        prices.insert(token, start);
                    }
                }
            }
        }

        Ok(prices)
    }
}

/// Group a quest's holdings under its entries, preserving join order.
///
/// Entries with no holdings are included (they settle as zero-investment
/// participants).
pub fn group_by_participant(
    entries: &[QuestEntry],
    holdings: Vec<Holding>,
) -> Vec<ParticipantHoldings> {
    let mut by_participant: BTreeMap<ParticipantId, Vec<Holding>> = BTreeMap::new();
    for holding in holdings {
        by_participant
            .entry(holding.participant_id.clone())
            .or_default()
            .push(holding);
    }

    entries
        .iter()
        .map(|entry| ParticipantHoldings {
            participant_id: entry.participant_id.clone(),
            joined_ms: entry.joined_ms,
            holdings: by_participant
                .remove(&entry.participant_id)
                .unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn entry(pid: &str, joined: i64) -> QuestEntry {
        QuestEntry::new(
            QuestId::new("q1".to_string()),
            ParticipantId::new(pid.to_string()),
            TimeMs::new(joined),
            Decimal::zero(),
            None,
        )
    }

    fn holding(pid: &str, token: &str) -> Holding {
        Holding::open(
            QuestId::new("q1".to_string()),
            ParticipantId::new(pid.to_string()),
            TokenId::new(token.to_string()),
            dec("1"),
            dec("1"),
            dec("1"),
            TimeMs::new(0),
        )
    }

    #[test]
    fn test_group_by_participant_preserves_join_order() {
        let entries = vec![entry("bob", 100), entry("alice", 200)];
        let holdings = vec![holding("alice", "APT"), holding("bob", "BTC")];

        let grouped = group_by_participant(&entries, holdings);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].participant_id.as_str(), "bob");
        assert_eq!(grouped[0].holdings.len(), 1);
        assert_eq!(grouped[1].participant_id.as_str(), "alice");
    }

    #[test]
    fn test_group_includes_idle_participants() {
        let entries = vec![entry("idle", 100)];
        let grouped = group_by_participant(&entries, vec![]);

        assert_eq!(grouped.len(), 1);
        assert!(grouped[0].holdings.is_empty());
    }
}
