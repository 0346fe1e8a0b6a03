//! Orchestration: the service layer wiring store, oracle, signer, and the
//! pure engines together.

pub mod sweep;
pub mod trading;

pub use sweep::{LifecycleSweeper, TickOutcome};
pub use trading::{NewQuest, QuestService, TradeError, ValuedHolding};
