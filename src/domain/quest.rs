//! Quest record and derived lifecycle status.

use crate::domain::{Decimal, QuestId, TimeMs, TokenId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Derived quest lifecycle phase.
///
/// Status is a pure function of (start, end, now); any stored status column
/// is a cache and must be recomputed before being trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    /// now < start: registration window.
    Upcoming,
    /// start <= now < end: trading window.
    Active,
    /// now >= end: settlement phase.
    Ended,
}

impl QuestStatus {
    /// Derive the status for a quest with the given boundaries at `now`.
    ///
    /// Total for any end > start: exactly one phase is returned, and the
    /// result is monotonic in `now`. Registration closes at `now == start`.
    pub fn at(start: TimeMs, end: TimeMs, now: TimeMs) -> QuestStatus {
        if now < start {
            QuestStatus::Upcoming
        } else if now < end {
            QuestStatus::Active
        } else {
            QuestStatus::Ended
        }
    }

    /// Stable string form used for the status cache column and DTOs.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Upcoming => "upcoming",
            QuestStatus::Active => "active",
            QuestStatus::Ended => "ended",
        }
    }
}

impl std::fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Construction-time validation failures for a quest.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestValidationError {
    #[error("Quest end must be after start (start={0}, end={1})")]
    EndNotAfterStart(i64, i64),
    #[error("{0} must be >= 0")]
    NegativeAmount(&'static str),
    #[error("Quest must list at least one tradable token")]
    EmptyTokenList,
    #[error("maxParticipants must be >= 1 when set")]
    ZeroMaxParticipants,
}

/// A time-boxed trading competition.
///
/// Start/end are immutable after creation; the only stored mutation during
/// the window is the participant count bump on join. `activated_ms`,
/// `settled_ms` and `settlement_hash` are stamped by the lifecycle sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub name: String,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
    pub max_participants: Option<u32>,
    pub participant_count: u32,
    /// Eligible token universe for this quest (non-empty).
    pub tokens: Vec<TokenId>,
    pub created_ms: TimeMs,
    pub activated_ms: Option<TimeMs>,
    pub settled_ms: Option<TimeMs>,
    pub settlement_hash: Option<String>,
}

impl Quest {
    /// Create a new quest, validating boundaries and amounts.
    ///
    /// # Errors
    /// Returns a `QuestValidationError` if end <= start, an amount is
    /// negative, the token list is empty, or maxParticipants is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        entry_fee: Decimal,
        prize_pool: Decimal,
        start_ms: TimeMs,
        end_ms: TimeMs,
        max_participants: Option<u32>,
        tokens: Vec<TokenId>,
        created_ms: TimeMs,
    ) -> Result<Self, QuestValidationError> {
        if end_ms <= start_ms {
            return Err(QuestValidationError::EndNotAfterStart(
                start_ms.as_i64(),
                end_ms.as_i64(),
            ));
        }
        if entry_fee.is_negative() {
            return Err(QuestValidationError::NegativeAmount("entryFee"));
        }
        if prize_pool.is_negative() {
            return Err(QuestValidationError::NegativeAmount("prizePool"));
        }
        if tokens.is_empty() {
            return Err(QuestValidationError::EmptyTokenList);
        }
        if max_participants == Some(0) {
            return Err(QuestValidationError::ZeroMaxParticipants);
        }

        Ok(Quest {
            id: QuestId::generate(),
            name,
            entry_fee,
            prize_pool,
            start_ms,
            end_ms,
            max_participants,
            participant_count: 0,
            tokens,
            created_ms,
            activated_ms: None,
            settled_ms: None,
            settlement_hash: None,
        })
    }

    /// Derived status at `now`.
    pub fn status_at(&self, now: TimeMs) -> QuestStatus {
        QuestStatus::at(self.start_ms, self.end_ms, now)
    }

    /// True if a token belongs to this quest's eligible universe.
    pub fn allows_token(&self, token: &TokenId) -> bool {
        self.tokens.contains(token)
    }

    /// Trading window length in hours (for the price walk).
    pub fn window_hours(&self) -> f64 {
        (self.end_ms.as_i64() - self.start_ms.as_i64()) as f64 / 3_600_000.0
    }
}
