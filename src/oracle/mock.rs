//! Mock price oracle for testing without randomness or network calls.

use super::{OracleError, PriceOracle};
use crate::domain::{Decimal, TokenId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Mock oracle that returns fixed prices and injectable failures.
#[derive(Debug, Clone, Default)]
pub struct MockOracle {
    prices: BTreeMap<TokenId, Decimal>,
    failing: BTreeSet<TokenId>,
}

impl MockOracle {
    /// Create a new mock oracle with no prices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fixed price returned for a token.
    pub fn with_price(mut self, token: TokenId, price: Decimal) -> Self {
        self.prices.insert(token, price);
        self
    }

    /// Make reads for a token fail with `PriceUnavailable`.
    pub fn with_failure(mut self, token: TokenId) -> Self {
        self.failing.insert(token);
        self
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn price(&self, token: &TokenId) -> Result<Decimal, OracleError> {
        if self.failing.contains(token) {
            return Err(OracleError::PriceUnavailable(token.as_str().to_string()));
        }

        self.prices
            .get(token)
            .copied()
            .ok_or_else(|| OracleError::PriceUnavailable(token.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_mock_oracle_returns_fixed_price() {
        let token = TokenId::new("APT".to_string());
        let oracle =
            MockOracle::new().with_price(token.clone(), Decimal::from_str("8.5").unwrap());

        let price = oracle.price(&token).await.unwrap();
        assert_eq!(price.to_canonical_string(), "8.5");
    }

    #[tokio::test]
    async fn test_mock_oracle_injected_failure() {
        let token = TokenId::new("APT".to_string());
        let oracle = MockOracle::new()
            .with_price(token.clone(), Decimal::from_str("8.5").unwrap())
            .with_failure(token.clone());

        assert!(oracle.price(&token).await.is_err());
    }
}
