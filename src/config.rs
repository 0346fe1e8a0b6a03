use crate::domain::{Decimal, TokenId};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Background sweep interval; 0 disables the loop (tick via HTTP only).
    pub sweep_interval_ms: u64,
    pub oracle_mode: OracleMode,
    pub oracle_url: Option<String>,
    /// Timeout for oracle reads on the snapshot path.
    pub oracle_timeout_ms: u64,
    /// Seed for the price walk and simulated oracle. None falls back to an
    /// entropy seed, which is logged so a settlement run can be replayed.
    pub price_seed: Option<u64>,
    /// Destination account for entry fees.
    pub treasury_address: String,
    /// Percentage split of the prize pool by rank.
    pub prize_splits: Vec<Decimal>,
    /// Base-price overrides for the simulated oracle.
    pub sim_prices: Vec<(TokenId, Decimal)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleMode {
    Simulated,
    Http,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let sweep_interval_ms = env_map
            .get("SWEEP_INTERVAL_MS")
            .map(|s| s.as_str())
            .unwrap_or("5000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "SWEEP_INTERVAL_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let oracle_mode = match env_map
            .get("ORACLE_MODE")
            .map(|s| s.as_str())
            .unwrap_or("simulated")
        {
            "simulated" => OracleMode::Simulated,
            "http" => OracleMode::Http,
            other => {
                return Err(ConfigError::InvalidValue(
                    "ORACLE_MODE".to_string(),
                    format!("must be simulated or http, got {}", other),
                ))
            }
        };

        let oracle_url = env_map.get("ORACLE_URL").cloned();
        if oracle_mode == OracleMode::Http && oracle_url.is_none() {
            return Err(ConfigError::MissingEnv("ORACLE_URL".to_string()));
        }

        let oracle_timeout_ms = env_map
            .get("ORACLE_TIMEOUT_MS")
            .map(|s| s.as_str())
            .unwrap_or("3000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "ORACLE_TIMEOUT_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let price_seed = match env_map.get("PRICE_SEED") {
            Some(s) => Some(s.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "PRICE_SEED".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?),
            None => None,
        };

        let treasury_address = env_map
            .get("TREASURY_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "treasury".to_string());

        let prize_splits = parse_prize_splits(&env_map)?;
        let sim_prices = parse_sim_prices(&env_map)?;

        Ok(Config {
            port,
            database_path,
            sweep_interval_ms,
            oracle_mode,
            oracle_url,
            oracle_timeout_ms,
            price_seed,
            treasury_address,
            prize_splits,
            sim_prices,
        })
    }
}

fn parse_prize_splits(env_map: &HashMap<String, String>) -> Result<Vec<Decimal>, ConfigError> {
    let raw = env_map
        .get("PRIZE_SPLITS")
        .map(|s| s.as_str())
        .unwrap_or("50,30,20");

    let splits: Vec<Decimal> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            Decimal::from_str(s).map_err(|_| {
                ConfigError::InvalidValue(
                    "PRIZE_SPLITS".to_string(),
                    format!("invalid percentage: {}", s),
                )
            })
        })
        .collect::<Result<_, _>>()?;

    let mut total = Decimal::zero();
    for split in &splits {
        if split.is_negative() {
            return Err(ConfigError::InvalidValue(
                "PRIZE_SPLITS".to_string(),
                format!("percentages must be >= 0, got {}", split.to_canonical_string()),
            ));
        }
        total = total + *split;
    }

    // an over-100 split would pay out more than the prize pool
    if total > Decimal::hundred() {
        return Err(ConfigError::InvalidValue(
            "PRIZE_SPLITS".to_string(),
            format!("percentages sum to {}, must not exceed 100", total.to_canonical_string()),
        ));
    }

    Ok(splits)
}

fn parse_sim_prices(
    env_map: &HashMap<String, String>,
) -> Result<Vec<(TokenId, Decimal)>, ConfigError> {
    let Some(raw) = env_map.get("SIM_PRICES") else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (token, price) = pair.split_once('=').ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SIM_PRICES".to_string(),
                    format!("expected TOKEN=PRICE, got {}", pair),
                )
            })?;
            let price = Decimal::from_str(price.trim()).map_err(|_| {
                ConfigError::InvalidValue(
                    "SIM_PRICES".to_string(),
                    format!("invalid price for {}", token),
                )
            })?;
            Ok((TokenId::new(token.trim().to_string()), price))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_missing_database_path() {
        let env_map = HashMap::new();
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.sweep_interval_ms, 5000);
        assert_eq!(config.oracle_mode, OracleMode::Simulated);
        assert_eq!(config.oracle_timeout_ms, 3000);
        assert_eq!(config.price_seed, None);
        assert_eq!(config.treasury_address, "treasury");
        assert_eq!(config.prize_splits.len(), 3);
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_http_mode_requires_url() {
        let mut env_map = setup_required_env();
        env_map.insert("ORACLE_MODE".to_string(), "http".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "ORACLE_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_oracle_mode() {
        let mut env_map = setup_required_env();
        env_map.insert("ORACLE_MODE".to_string(), "magic".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "ORACLE_MODE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_prize_splits_parsed() {
        let mut env_map = setup_required_env();
        env_map.insert("PRIZE_SPLITS".to_string(), "60, 40".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.prize_splits.len(), 2);
        assert_eq!(config.prize_splits[0].to_canonical_string(), "60");
    }

    #[test]
    fn test_prize_splits_reject_negative() {
        let mut env_map = setup_required_env();
        env_map.insert("PRIZE_SPLITS".to_string(), "120,-20".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, msg)) => {
                assert_eq!(k, "PRIZE_SPLITS");
                assert!(msg.contains(">= 0"));
            }
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_prize_splits_reject_sum_over_hundred() {
        let mut env_map = setup_required_env();
        env_map.insert("PRIZE_SPLITS".to_string(), "60,50".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, msg)) => {
                assert_eq!(k, "PRIZE_SPLITS");
                assert!(msg.contains("exceed 100"));
            }
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_prize_splits_allow_sum_under_hundred() {
        let mut env_map = setup_required_env();
        env_map.insert("PRIZE_SPLITS".to_string(), "40,20".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.prize_splits.len(), 2);
    }

    #[test]
    fn test_sim_prices_parsed() {
        let mut env_map = setup_required_env();
        env_map.insert("SIM_PRICES".to_string(), "APT=8.5, XYZ=0.01".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.sim_prices.len(), 2);
        assert_eq!(config.sim_prices[0].0.as_str(), "APT");
    }

    #[test]
    fn test_sim_prices_rejects_malformed_pair() {
        let mut env_map = setup_required_env();
        env_map.insert("SIM_PRICES".to_string(), "APT:8.5".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "SIM_PRICES"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_price_seed_parsed() {
        let mut env_map = setup_required_env();
        env_map.insert("PRICE_SEED".to_string(), "12345".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.price_seed, Some(12345));
    }
}
