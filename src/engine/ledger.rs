//! Pure ledger math: buy/sell with running-average cost basis.
//!
//! These functions never touch storage; the orchestration layer reads the
//! current row, applies one of them, and writes the result back under the
//! single-writer guard.

use crate::domain::{Decimal, Holding, ParticipantId, QuestId, TimeMs, TokenId};
use thiserror::Error;

/// Ledger-level rejection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Quantity must be > 0, got {0}")]
    NonPositiveQuantity(Decimal),
}

/// Outcome of a sell applied to a holding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellResult {
    /// Quantity actually sold. Oversized requests clamp to the held
    /// quantity, so this can be less than what was asked for.
    pub sold: Decimal,
    /// Cost basis removed: sold x (total_cost / quantity) at the existing
    /// average, never at market price.
    pub cost_removed: Decimal,
    /// The updated row, or None when the position closed (row deleted).
    pub remaining: Option<Holding>,
}

/// Apply a buy of `quantity` units at `price` to an optional existing row.
///
/// Cost = quantity x price. An existing holding accumulates quantity and
/// total cost (the average cost basis shifts); a new holding opens with
/// entry_price = price.
///
/// # Errors
/// Returns `NonPositiveQuantity` if quantity <= 0.
pub fn apply_buy(
    existing: Option<Holding>,
    quest_id: &QuestId,
    participant_id: &ParticipantId,
    token_id: &TokenId,
    quantity: Decimal,
    price: Decimal,
    now: TimeMs,
) -> Result<Holding, LedgerError> {
    if !quantity.is_positive() {
        return Err(LedgerError::NonPositiveQuantity(quantity));
    }

    let cost = quantity * price;

    Ok(match existing {
        Some(mut holding) => {
            holding.quantity = holding.quantity + quantity;
            holding.total_cost = holding.total_cost + cost;
            holding.updated_ms = now;
            holding
        }
        None => Holding::open(
            quest_id.clone(),
            participant_id.clone(),
            token_id.clone(),
            quantity,
            cost,
            price,
            now,
        ),
    })
}

/// Apply a sell of `quantity` units to an existing holding.
///
/// The sell quantity clamps to at most the held quantity: an oversized
/// request is a full close, not an error. Cost is
/// removed proportionally at the existing average, so the cost basis of the
/// remainder is unchanged by the sale.
///
/// # Errors
/// Returns `NonPositiveQuantity` if quantity <= 0.
pub fn apply_sell(
    mut holding: Holding,
    quantity: Decimal,
    now: TimeMs,
) -> Result<SellResult, LedgerError> {
    if !quantity.is_positive() {
        return Err(LedgerError::NonPositiveQuantity(quantity));
    }

    let sold = quantity.min(holding.quantity);
    let average_cost = holding.average_cost();

    if sold == holding.quantity {
        return Ok(SellResult {
            sold,
            cost_removed: holding.total_cost,
            remaining: None,
        });
    }

    let cost_removed = sold * average_cost;
    holding.quantity = holding.quantity - sold;
    holding.total_cost = holding.total_cost - cost_removed;
    holding.updated_ms = now;

    Ok(SellResult {
        sold,
        cost_removed,
        remaining: Some(holding),
    })
}
