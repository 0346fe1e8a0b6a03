//! Lifecycle sweeper: activation and settlement driven by wall-clock time.
//!
//! A tick is safe to fire concurrently or repeatedly: snapshot writes are
//! create-if-absent, end prices fill only NULL columns, and the settlement
//! commits in one single-winner transaction after everything else. A
//! crash mid-settlement leaves the quest unclaimed with no partial results
//! and the next tick recomputes the identical outcome from the recorded
//! walk.

use crate::db::Repository;
use crate::domain::{Decimal, PriceSnapshot, Quest, TimeMs, TokenId};
use crate::engine::fingerprint::settlement_fingerprint;
use crate::engine::pricing::{end_prices, quest_rng, start_prices};
use crate::engine::settlement::{settle, PrizePolicy};
use crate::oracle::PriceOracle;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::trading::group_by_participant;

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub activated: usize,
    pub settled: usize,
}

pub struct LifecycleSweeper {
    repo: Arc<Repository>,
    oracle: Arc<dyn PriceOracle>,
    prize_policy: Arc<dyn PrizePolicy>,
    price_seed: u64,
    oracle_timeout: Duration,
}

impl LifecycleSweeper {
    pub fn new(
        repo: Arc<Repository>,
        oracle: Arc<dyn PriceOracle>,
        prize_policy: Arc<dyn PrizePolicy>,
        price_seed: u64,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            oracle,
            prize_policy,
            price_seed,
            oracle_timeout,
        }
    }

    /// One sweep pass: activate quests whose window has opened, then settle
    /// quests whose window has closed.
    ///
    /// Activation runs first so a quest whose whole window fits inside one
    /// sweep interval still gets a start snapshot before it is settled.
    pub async fn tick(&self, now: TimeMs) -> Result<TickOutcome, sqlx::Error> {
        let mut outcome = TickOutcome::default();

        for quest in self.repo.list_due_for_activation(now).await? {
            match self.activate(&quest, now).await {
                Ok(true) => outcome.activated += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(quest = %quest.id, error = %e, "Activation failed, will retry next tick");
                }
            }
        }

        for quest in self.repo.list_due_for_settlement(now).await? {
            match self.settle_quest(&quest, now).await {
                Ok(true) => outcome.settled += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(quest = %quest.id, error = %e, "Settlement failed, will retry next tick");
                }
            }
        }

        if outcome.activated > 0 || outcome.settled > 0 {
            info!(
                activated = outcome.activated,
                settled = outcome.settled,
                "Lifecycle sweep applied transitions"
            );
        }

        Ok(outcome)
    }

    /// Capture start snapshots for a quest and stamp it active.
    async fn activate(&self, quest: &Quest, now: TimeMs) -> Result<bool, sqlx::Error> {
        let base = self.base_prices(&quest.tokens, now).await?;

        let mut rng = quest_rng(self.price_seed, &quest.id, "start");
        let captured = start_prices(&base, &mut rng);

        for token in &captured.unavailable {
            warn!(quest = %quest.id, token = %token, "No start price available, recording as unavailable");
        }

        let snapshots: Vec<PriceSnapshot> = quest
            .tokens
            .iter()
            .map(|token| {
                PriceSnapshot::at_start(
                    quest.id.clone(),
                    token.clone(),
                    captured.prices.get(token).copied(),
                    now,
                )
            })
            .collect();

        self.repo.insert_start_snapshots(&snapshots).await?;

        let won = self.repo.mark_activated(&quest.id, now).await?;
        if won {
            info!(quest = %quest.id, tokens = snapshots.len(), "Quest activated");
        }
        Ok(won)
    }

    /// Walk end prices, compute the final ranking, and commit it.
    ///
    /// Everything before the final commit is idempotent: end prices fill
    /// only NULL columns and the ranking is a pure function of the recorded
    /// snapshots, so a crash at any earlier point leaves the quest claimable
    /// and a retry reproduces the same result. The commit itself stamps the
    /// settlement atomically and is the single-winner gate.
    async fn settle_quest(&self, quest: &Quest, now: TimeMs) -> Result<bool, sqlx::Error> {
        let snapshots = self.repo.list_snapshots(&quest.id).await?;
        let start: BTreeMap<TokenId, Decimal> = snapshots
            .iter()
            .filter_map(|s| s.start_price.map(|p| (s.token_id.clone(), p)))
            .collect();

        // fill-if-null, so a retried settlement reuses the recorded walk
        let mut rng = quest_rng(self.price_seed, &quest.id, "end");
        let walked = end_prices(&start, quest.window_hours(), &mut rng);
        self.repo.fill_end_prices(&quest.id, &walked, now).await?;

        let snapshots = self.repo.list_snapshots(&quest.id).await?;
        let end: BTreeMap<TokenId, Decimal> = snapshots
            .iter()
            .filter_map(|s| s.end_price.map(|p| (s.token_id.clone(), p)))
            .collect();

        let entries = self.repo.list_entries(&quest.id).await?;
        let holdings = self.repo.list_holdings_for_quest(&quest.id).await?;
        let participants = group_by_participant(&entries, holdings);

        let leaderboard = settle(
            &participants,
            &start,
            &end,
            quest.prize_pool,
            self.prize_policy.as_ref(),
        );
        let hash = settlement_fingerprint(&leaderboard, &snapshots);

        if !self
            .repo
            .finalize_settlement(&quest.id, &leaderboard, &hash, now)
            .await?
        {
            return Ok(false);
        }

        info!(
            quest = %quest.id,
            participants = leaderboard.len(),
            fingerprint = %hash,
            "Quest settled"
        );
        Ok(true)
    }

    /// Resolve base prices for the start snapshot: live oracle read under a
    /// timeout, falling back to the last cached reference price, else
    /// unavailable.
    async fn base_prices(
        &self,
        tokens: &[TokenId],
        now: TimeMs,
    ) -> Result<BTreeMap<TokenId, Option<Decimal>>, sqlx::Error> {
        let mut base = BTreeMap::new();

        for token in tokens {
            let read = tokio::time::timeout(self.oracle_timeout, self.oracle.price(token)).await;
            let price = match read {
                Ok(Ok(price)) => {
                    self.repo.upsert_reference_price(token, price, now).await?;
                    Some(price)
                }
                Ok(Err(e)) => {
                    warn!(token = %token, error = %e, "Oracle read failed, trying cached reference price");
                    self.repo.get_reference_price(token).await?
                }
                Err(_) => {
                    warn!(token = %token, timeout_ms = self.oracle_timeout.as_millis() as u64,
                        "Oracle read timed out, trying cached reference price");
                    self.repo.get_reference_price(token).await?
                }
            };
            base.insert(token.clone(), price);
        }

        Ok(base)
    }
}
