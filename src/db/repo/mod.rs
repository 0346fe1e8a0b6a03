//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by aggregate:
//! - `quests.rs` - quest and entry operations
//! - `holdings.rs` - ledger row operations
//! - `snapshots.rs` - price snapshot and reference price operations
//!
//! All monetary values are stored as canonical decimal strings (never REAL)
//! and summed in Rust with the `Decimal` wrapper to stay lossless.

mod holdings;
mod quests;
mod snapshots;

use crate::domain::Decimal;
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }
}

/// Parse a stored decimal string, falling back to zero with a warning.
///
/// Stored values are written canonically by this process, so a parse
/// failure indicates external tampering or corruption, not a normal path.
pub(crate) fn parse_stored_decimal(value: &str, column: &'static str, key: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_else(|e| {
        warn!(
            key = %key,
            column = column,
            value = %value,
            error = %e,
            "Failed to parse stored decimal, using default"
        );
        Decimal::default()
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Repository;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    pub async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }
}
