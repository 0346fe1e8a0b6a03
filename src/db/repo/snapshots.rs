//! Price snapshot and reference-price operations for the repository.
//!
//! Snapshot writes are guarded so history is never overwritten: start rows
//! insert with ON CONFLICT DO NOTHING, end prices fill only NULL columns.
//! Re-running the lifecycle sweep cannot change a recorded price.

use crate::domain::{Decimal, PriceSnapshot, QuestId, TimeMs, TokenId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeMap;

use super::{parse_stored_decimal, Repository};

fn snapshot_from_row(row: &SqliteRow) -> PriceSnapshot {
    let quest_id: String = row.get("quest_id");
    let token_id: String = row.get("token_id");
    let key = format!("{}/{}", quest_id, token_id);

    PriceSnapshot {
        start_price: row
            .get::<Option<String>, _>("start_price")
            .map(|p| parse_stored_decimal(&p, "start_price", &key)),
        end_price: row
            .get::<Option<String>, _>("end_price")
            .map(|p| parse_stored_decimal(&p, "end_price", &key)),
        quest_id: QuestId::new(quest_id),
        token_id: TokenId::new(token_id),
        snapped_ms: TimeMs::new(row.get("snapped_ms")),
        updated_ms: TimeMs::new(row.get("updated_ms")),
    }
}

impl Repository {
    /// Insert start snapshots in bulk, create-if-absent.
    ///
    /// Returns the number of newly inserted rows; existing (quest, token)
    /// rows are left untouched so a double-fired sweep cannot re-snapshot.
    pub async fn insert_start_snapshots(
        &self,
        snapshots: &[PriceSnapshot],
    ) -> Result<usize, sqlx::Error> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for snapshot in snapshots {
            let result = sqlx::query(
                r#"
                INSERT INTO price_snapshots
                (quest_id, token_id, start_price, end_price, snapped_ms, updated_ms)
                VALUES (?, ?, ?, NULL, ?, ?)
                ON CONFLICT(quest_id, token_id) DO NOTHING
                "#,
            )
            .bind(snapshot.quest_id.as_str())
            .bind(snapshot.token_id.as_str())
            .bind(snapshot.start_price.map(|p| p.to_canonical_string()))
            .bind(snapshot.snapped_ms.as_i64())
            .bind(snapshot.updated_ms.as_i64())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Fill end prices in bulk, only where still NULL.
    ///
    /// Returns the number of rows actually filled.
    pub async fn fill_end_prices(
        &self,
        quest_id: &QuestId,
        end_prices: &BTreeMap<TokenId, Decimal>,
        now: TimeMs,
    ) -> Result<usize, sqlx::Error> {
        if end_prices.is_empty() {
            return Ok(0);
        }

        let mut filled = 0usize;
        let mut tx = self.pool.begin().await?;

        for (token, price) in end_prices {
            let result = sqlx::query(
                r#"
                UPDATE price_snapshots
                SET end_price = ?, updated_ms = ?
                WHERE quest_id = ? AND token_id = ? AND end_price IS NULL
                "#,
            )
            .bind(price.to_canonical_string())
            .bind(now.as_i64())
            .bind(quest_id.as_str())
            .bind(token.as_str())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                filled += 1;
            }
        }

        tx.commit().await?;
        Ok(filled)
    }

    /// List a quest's snapshots ordered by token.
    pub async fn list_snapshots(
        &self,
        quest_id: &QuestId,
    ) -> Result<Vec<PriceSnapshot>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM price_snapshots WHERE quest_id = ? ORDER BY token_id ASC",
        )
        .bind(quest_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(snapshot_from_row).collect())
    }

    // =========================================================================
    // Reference price cache
    // =========================================================================

    /// Record the latest oracle read for a token; the fallback when the
    /// oracle times out during snapshotting.
    pub async fn upsert_reference_price(
        &self,
        token: &TokenId,
        price: Decimal,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO reference_prices (token_id, price, updated_ms)
            VALUES (?, ?, ?)
            ON CONFLICT(token_id) DO UPDATE SET
                price = excluded.price,
                updated_ms = excluded.updated_ms
            "#,
        )
        .bind(token.as_str())
        .bind(price.to_canonical_string())
        .bind(now.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Last cached price for a token, if any.
    pub async fn get_reference_price(
        &self,
        token: &TokenId,
    ) -> Result<Option<Decimal>, sqlx::Error> {
        let row = sqlx::query("SELECT price FROM reference_prices WHERE token_id = ?")
            .bind(token.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| {
            parse_stored_decimal(&r.get::<String, _>("price"), "price", token.as_str())
        }))
    }
}
