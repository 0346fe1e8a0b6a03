//! Price oracle abstraction: the market-data collaborator.
//!
//! The core treats a price feed as `price(token) -> Decimal`; anything
//! behind that seam is substitutable, including the bundled simulated feed
//! used for mock-market quests and tests.

use crate::domain::{Decimal, TokenId};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod simulated;

pub use http::HttpOracle;
pub use mock::MockOracle;
pub use simulated::SimulatedOracle;

/// Price oracle trait.
///
/// Implementations must be safe to call concurrently; retry/backoff is the
/// implementation's concern, not the caller's.
#[async_trait]
pub trait PriceOracle: Send + Sync + fmt::Debug {
    /// Current reference price for a token.
    ///
    /// # Errors
    /// Returns `PriceUnavailable` when the token has no resolvable price;
    /// callers degrade per the snapshot/settlement fallback rules rather
    /// than aborting.
    async fn price(&self, token: &TokenId) -> Result<Decimal, OracleError>;
}

/// Error type for oracle operations.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("No price available for token {0}")]
    PriceUnavailable(String),
    #[error("Rate limited")]
    RateLimited,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_error_display() {
        let err = OracleError::Network("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = OracleError::Http {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = OracleError::PriceUnavailable("ZZZ".to_string());
        assert_eq!(err.to_string(), "No price available for token ZZZ");
    }
}
