//! Simulated price oracle: the bundled mock-market mode.
//!
//! Serves prices from a base table with a small seeded jitter so repeated
//! reads during a quest drift realistically but replay under a fixed seed.

use super::{OracleError, PriceOracle};
use crate::domain::{Decimal, TokenId};
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Per-read jitter band (+/- 0.5%).
const READ_JITTER: f64 = 0.005;

/// Simulated oracle over a fixed base-price table.
#[derive(Debug)]
pub struct SimulatedOracle {
    base_prices: BTreeMap<TokenId, Decimal>,
    rng: Mutex<ChaCha8Rng>,
}

impl SimulatedOracle {
    /// Create with the built-in base-price table and the given seed.
    pub fn new(seed: u64) -> Self {
        Self::with_table(seed, default_base_prices())
    }

    /// Create over an explicit base-price table.
    pub fn with_table(seed: u64, base_prices: BTreeMap<TokenId, Decimal>) -> Self {
        SimulatedOracle {
            base_prices,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Override or add a single base price.
    pub fn with_price(mut self, token: TokenId, price: Decimal) -> Self {
        self.base_prices.insert(token, price);
        self
    }
}

/// Built-in table: a few large caps plus long-tail tokens for demos.
fn default_base_prices() -> BTreeMap<TokenId, Decimal> {
    [
        ("APT", "8.5"),
        ("BTC", "65000"),
        ("ETH", "3200"),
        ("SOL", "150"),
        ("USDC", "1"),
        ("DOGE", "0.12"),
        ("PEPE", "0.0000095"),
    ]
    .into_iter()
    .map(|(token, price)| {
        (
            TokenId::new(token.to_string()),
            Decimal::from_str_canonical(price).expect("literal"),
        )
    })
    .collect()
}

#[async_trait]
impl PriceOracle for SimulatedOracle {
    async fn price(&self, token: &TokenId) -> Result<Decimal, OracleError> {
        let base = self
            .base_prices
            .get(token)
            .ok_or_else(|| OracleError::PriceUnavailable(token.as_str().to_string()))?;

        let jitter = {
            let mut rng = self.rng.lock().expect("oracle rng lock");
            (rng.gen::<f64>() * 2.0 - 1.0) * READ_JITTER
        };

        let jittered = base.to_f64() * (1.0 + jitter);
        Decimal::from_f64(jittered)
            .map(|p| p.round_dp(8))
            .ok_or_else(|| OracleError::PriceUnavailable(token.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_default_table_has_large_caps() {
        let table = default_base_prices();
        assert!(table.contains_key(&TokenId::new("BTC".to_string())));
        assert!(table.contains_key(&TokenId::new("APT".to_string())));
    }

    #[tokio::test]
    async fn test_price_jitter_stays_in_band() {
        let oracle = SimulatedOracle::new(42);
        let token = TokenId::new("APT".to_string());

        for _ in 0..20 {
            let price = oracle.price(&token).await.unwrap().to_f64();
            assert!(price >= 8.5 * 0.995 && price <= 8.5 * 1.005, "price {} out of band", price);
        }
    }

    #[tokio::test]
    async fn test_unknown_token_unavailable() {
        let oracle = SimulatedOracle::new(42);
        let result = oracle.price(&TokenId::new("NOPE".to_string())).await;
        assert!(matches!(result, Err(OracleError::PriceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_same_seed_same_reads() {
        let token = TokenId::new("BTC".to_string());
        let a = SimulatedOracle::new(7);
        let b = SimulatedOracle::new(7);

        for _ in 0..5 {
            assert_eq!(a.price(&token).await.unwrap(), b.price(&token).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_with_price_override() {
        let token = TokenId::new("XYZ".to_string());
        let oracle =
            SimulatedOracle::new(1).with_price(token.clone(), Decimal::from_str("2").unwrap());
        let price = oracle.price(&token).await.unwrap().to_f64();
        assert!(price > 1.9 && price < 2.1);
    }
}
