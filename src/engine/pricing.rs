//! Price snapshot walk: start jitter and volatility-bounded end walk.
//!
//! Deterministic under a fixed seed: tokens are processed in sorted order
//! and every token consumes the same number of RNG draws whether or not its
//! price resolves, so two runs with the same inputs and seed agree exactly.
//! The sweeper derives a per-quest `ChaCha8Rng` from the configured seed so
//! a settlement can be replayed for audit.

use crate::domain::{Decimal, QuestId, TokenId};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Symmetric jitter applied to base prices at quest start (+/- 1%).
const START_JITTER: f64 = 0.01;
/// Upward bias point of the walk: delta centers on U(0,1) - 0.45.
const DRIFT_BIAS: f64 = 0.45;
/// Chance per token of doubling the delta magnitude (tail event).
const TAIL_PROBABILITY: f64 = 0.10;
/// End price floor as a fraction of the start price.
const FLOOR_RATIO: f64 = 0.5;
/// Decimal places snapshot prices are rounded to.
const PRICE_DP: u32 = 8;

/// Hourly volatility for a token symbol.
///
/// Large-cap reference assets move less per hour than long-tail tokens.
pub fn volatility(token: &TokenId) -> f64 {
    match token.as_str() {
        "BTC" | "ETH" => 0.02,
        "APT" | "SOL" => 0.04,
        _ => 0.08,
    }
}

/// Result of a start-price capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPrices {
    pub prices: BTreeMap<TokenId, Decimal>,
    /// Tokens whose base price could not be resolved; recorded as
    /// unavailable rather than aborting the batch.
    pub unavailable: Vec<TokenId>,
}

/// Derive a replayable RNG for one quest and walk phase ("start" / "end")
/// from the configured seed. Phases get independent streams so the end walk
/// never depends on how many draws the start capture consumed.
pub fn quest_rng(seed: u64, quest_id: &QuestId, phase: &str) -> ChaCha8Rng {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(quest_id.as_str().as_bytes());
    hasher.update(phase.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    ChaCha8Rng::seed_from_u64(u64::from_le_bytes(bytes))
}

/// Capture start prices: each resolvable base price jittered by +/- 1%.
pub fn start_prices(
    base_prices: &BTreeMap<TokenId, Option<Decimal>>,
    rng: &mut ChaCha8Rng,
) -> StartPrices {
    let mut prices = BTreeMap::new();
    let mut unavailable = Vec::new();

    for (token, base) in base_prices {
        // one draw per token regardless of availability keeps the stream
        // aligned for replay
        let jitter = (rng.gen::<f64>() * 2.0 - 1.0) * START_JITTER;
        match base {
            Some(base) => {
                let jittered = base.to_f64() * (1.0 + jitter);
                match Decimal::from_f64(jittered) {
                    Some(price) => {
                        prices.insert(token.clone(), price.round_dp(PRICE_DP));
                    }
                    None => unavailable.push(token.clone()),
                }
            }
            None => unavailable.push(token.clone()),
        }
    }

    StartPrices {
        prices,
        unavailable,
    }
}

/// Walk each start price forward over the elapsed window.
///
/// `delta = (U(0,1) - 0.45) * volatility(token) * elapsed_hours`, with a 10%
/// chance of doubling the magnitude, floored at 50% of the start price.
pub fn end_prices(
    start: &BTreeMap<TokenId, Decimal>,
    elapsed_hours: f64,
    rng: &mut ChaCha8Rng,
) -> BTreeMap<TokenId, Decimal> {
    let mut result = BTreeMap::new();

    for (token, start_price) in start {
        let mut delta = (rng.gen::<f64>() - DRIFT_BIAS) * volatility(token) * elapsed_hours;
        if rng.gen::<f64>() < TAIL_PROBABILITY {
            delta *= 2.0;
        }

        let start_f = start_price.to_f64();
        let walked = (start_f * (1.0 + delta)).max(start_f * FLOOR_RATIO);
        if let Some(price) = Decimal::from_f64(walked) {
            result.insert(token.clone(), price.round_dp(PRICE_DP));
        }
    }

    result
}
