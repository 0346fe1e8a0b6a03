//! Pure computation engines for deterministic ledger logic.
//!
//! Nothing in here performs I/O: the ledger math, the price walk, and the
//! settlement pass are plain functions the orchestration layer drives.

pub mod fingerprint;
pub mod ledger;
pub mod pricing;
pub mod settlement;

pub use fingerprint::settlement_fingerprint;
pub use ledger::{apply_buy, apply_sell, LedgerError, SellResult};
pub use pricing::{end_prices, quest_rng, start_prices, volatility, StartPrices};
pub use settlement::{settle, ParticipantHoldings, PodiumSplit, PrizePolicy};
