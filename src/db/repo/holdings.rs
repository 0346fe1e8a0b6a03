//! Ledger row operations for the repository.
//!
//! Each mutation is a single atomic statement; serialization of
//! read-modify-write sequences on a holding is the orchestration layer's
//! job (single-writer guard), not the store's.

use crate::domain::{Holding, ParticipantId, QuestId, TimeMs, TokenId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{parse_stored_decimal, Repository};

fn holding_from_row(row: &SqliteRow) -> Holding {
    let quest_id: String = row.get("quest_id");
    let participant_id: String = row.get("participant_id");
    let token_id: String = row.get("token_id");
    let key = format!("{}/{}/{}", quest_id, participant_id, token_id);

    Holding {
        quantity: parse_stored_decimal(&row.get::<String, _>("quantity"), "quantity", &key),
        total_cost: parse_stored_decimal(&row.get::<String, _>("total_cost"), "total_cost", &key),
        entry_price: parse_stored_decimal(
            &row.get::<String, _>("entry_price"),
            "entry_price",
            &key,
        ),
        quest_id: QuestId::new(quest_id),
        participant_id: ParticipantId::new(participant_id),
        token_id: TokenId::new(token_id),
        updated_ms: TimeMs::new(row.get("updated_ms")),
    }
}

impl Repository {
    /// Load one ledger row.
    pub async fn get_holding(
        &self,
        quest_id: &QuestId,
        participant_id: &ParticipantId,
        token_id: &TokenId,
    ) -> Result<Option<Holding>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM holdings
            WHERE quest_id = ? AND participant_id = ? AND token_id = ?
            "#,
        )
        .bind(quest_id.as_str())
        .bind(participant_id.as_str())
        .bind(token_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(holding_from_row))
    }

    /// List one participant's holdings in a quest, ordered by token.
    pub async fn list_holdings(
        &self,
        quest_id: &QuestId,
        participant_id: &ParticipantId,
    ) -> Result<Vec<Holding>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM holdings
            WHERE quest_id = ? AND participant_id = ?
            ORDER BY token_id ASC
            "#,
        )
        .bind(quest_id.as_str())
        .bind(participant_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(holding_from_row).collect())
    }

    /// List every holding in a quest (the settlement input), ordered
    /// deterministically.
    pub async fn list_holdings_for_quest(
        &self,
        quest_id: &QuestId,
    ) -> Result<Vec<Holding>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM holdings
            WHERE quest_id = ?
            ORDER BY participant_id ASC, token_id ASC
            "#,
        )
        .bind(quest_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(holding_from_row).collect())
    }

    /// Write a ledger row (insert or replace on the composite key).
    pub async fn upsert_holding(&self, holding: &Holding) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO holdings
            (quest_id, participant_id, token_id, quantity, total_cost, entry_price, updated_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(holding.quest_id.as_str())
        .bind(holding.participant_id.as_str())
        .bind(holding.token_id.as_str())
        .bind(holding.quantity.to_canonical_string())
        .bind(holding.total_cost.to_canonical_string())
        .bind(holding.entry_price.to_canonical_string())
        .bind(holding.updated_ms.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a ledger row (position fully closed).
    pub async fn delete_holding(
        &self,
        quest_id: &QuestId,
        participant_id: &ParticipantId,
        token_id: &TokenId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM holdings
            WHERE quest_id = ? AND participant_id = ? AND token_id = ?
            "#,
        )
        .bind(quest_id.as_str())
        .bind(participant_id.as_str())
        .bind(token_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
