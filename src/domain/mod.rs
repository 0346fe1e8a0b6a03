//! Domain types for the quest trading ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, QuestId, ParticipantId, TokenId
//! - Quest, entry, holding, and snapshot records
//! - The derived quest status function (pure and total over the window)

pub mod decimal;
pub mod entry;
pub mod holding;
pub mod leaderboard;
pub mod primitives;
pub mod quest;
pub mod snapshot;

pub use decimal::Decimal;
pub use entry::QuestEntry;
pub use holding::Holding;
pub use leaderboard::LeaderboardEntry;
pub use primitives::{ParticipantId, QuestId, TimeMs, TokenId};
pub use quest::{Quest, QuestStatus, QuestValidationError};
pub use snapshot::PriceSnapshot;
