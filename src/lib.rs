pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod orchestration;
pub mod signer;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Decimal, Holding, LeaderboardEntry, ParticipantId, PriceSnapshot, Quest, QuestEntry, QuestId,
    QuestStatus, TimeMs, TokenId,
};
pub use error::AppError;
pub use oracle::{HttpOracle, MockOracle, PriceOracle, SimulatedOracle};
pub use orchestration::{LifecycleSweeper, QuestService};
pub use signer::{MockSigner, WalletSigner};
