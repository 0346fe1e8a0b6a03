//! HTTP price oracle client.

use super::{OracleError, PriceOracle};
use crate::domain::{Decimal, TokenId};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Oracle backed by an HTTP market-data service.
///
/// Expects `GET {base_url}/price/{token}` returning `{"price": "<decimal>"}`.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: Client,
    base_url: String,
}

impl HttpOracle {
    /// Create a new HTTP oracle client.
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn get_price_json(&self, token: &TokenId) -> Result<serde_json::Value, OracleError> {
        let url = format!("{}/price/{}", self.base_url, token.as_str());
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                backoff::Error::transient(OracleError::Network(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(OracleError::RateLimited));
            }
            if status == 404 {
                return Err(backoff::Error::permanent(OracleError::PriceUnavailable(
                    token.as_str().to_string(),
                )));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(OracleError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(OracleError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(OracleError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl PriceOracle for HttpOracle {
    async fn price(&self, token: &TokenId) -> Result<Decimal, OracleError> {
        debug!("Fetching price for token={}", token);

        let response = self.get_price_json(token).await?;
        parse_price(&response, token)
    }
}

fn parse_price(response: &serde_json::Value, token: &TokenId) -> Result<Decimal, OracleError> {
    let price = response
        .get("price")
        .ok_or_else(|| OracleError::Parse("Missing price field".to_string()))?;

    // accept both string and numeric price fields
    match price {
        serde_json::Value::String(s) => Decimal::from_str_canonical(s)
            .map_err(|e| OracleError::Parse(format!("Invalid price: {}", e))),
        serde_json::Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str_canonical(&s)
                .map_err(|e| OracleError::Parse(format!("Invalid price: {}", e)))
        }
        serde_json::Value::Null => Err(OracleError::PriceUnavailable(
            token.as_str().to_string(),
        )),
        _ => Err(OracleError::Parse("Unexpected price type".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> TokenId {
        TokenId::new(s.to_string())
    }

    #[test]
    fn test_parse_price_string_form() {
        let response = serde_json::json!({"price": "123.45"});
        let price = parse_price(&response, &token("APT")).unwrap();
        assert_eq!(price.to_canonical_string(), "123.45");
    }

    #[test]
    fn test_parse_price_numeric_form() {
        let response = serde_json::json!({"price": 8.5});
        let price = parse_price(&response, &token("APT")).unwrap();
        assert_eq!(price.to_canonical_string(), "8.5");
    }

    #[test]
    fn test_parse_price_null_is_unavailable() {
        let response = serde_json::json!({"price": null});
        let result = parse_price(&response, &token("APT"));
        assert!(matches!(result, Err(OracleError::PriceUnavailable(_))));
    }

    #[test]
    fn test_parse_price_missing_field() {
        let response = serde_json::json!({"px": "1"});
        let result = parse_price(&response, &token("APT"));
        assert!(matches!(result, Err(OracleError::Parse(_))));
    }
}
