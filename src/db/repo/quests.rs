//! Quest and quest-entry operations for the repository.

use crate::domain::{
    LeaderboardEntry, ParticipantId, Quest, QuestEntry, QuestId, TimeMs, TokenId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use super::{parse_stored_decimal, Repository};

fn quest_from_row(row: &SqliteRow) -> Quest {
    let id: String = row.get("id");
    let tokens_json: String = row.get("tokens");
    let tokens: Vec<TokenId> = serde_json::from_str::<Vec<String>>(&tokens_json)
        .unwrap_or_else(|e| {
            warn!(quest = %id, error = %e, "Failed to parse stored token list, using empty");
            Vec::new()
        })
        .into_iter()
        .map(TokenId::new)
        .collect();

    Quest {
        entry_fee: parse_stored_decimal(&row.get::<String, _>("entry_fee"), "entry_fee", &id),
        prize_pool: parse_stored_decimal(&row.get::<String, _>("prize_pool"), "prize_pool", &id),
        id: QuestId::new(id),
        name: row.get("name"),
        start_ms: TimeMs::new(row.get("start_ms")),
        end_ms: TimeMs::new(row.get("end_ms")),
        max_participants: row.get::<Option<i64>, _>("max_participants").map(|m| m as u32),
        participant_count: row.get::<i64, _>("participant_count") as u32,
        tokens,
        created_ms: TimeMs::new(row.get("created_ms")),
        activated_ms: row.get::<Option<i64>, _>("activated_ms").map(TimeMs::new),
        settled_ms: row.get::<Option<i64>, _>("settled_ms").map(TimeMs::new),
        settlement_hash: row.get("settlement_hash"),
    }
}

fn entry_from_row(row: &SqliteRow) -> QuestEntry {
    let quest_id: String = row.get("quest_id");
    let participant_id: String = row.get("participant_id");
    let key = format!("{}/{}", quest_id, participant_id);

    QuestEntry {
        fee_paid: parse_stored_decimal(&row.get::<String, _>("fee_paid"), "fee_paid", &key),
        prize_won: row
            .get::<Option<String>, _>("prize_won")
            .map(|p| parse_stored_decimal(&p, "prize_won", &key)),
        quest_id: QuestId::new(quest_id),
        participant_id: ParticipantId::new(participant_id),
        joined_ms: TimeMs::new(row.get("joined_ms")),
        fee_tx_id: row.get("fee_tx_id"),
        final_rank: row.get::<Option<i64>, _>("final_rank").map(|r| r as u32),
    }
}

impl Repository {
    /// Insert a newly created quest.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_quest(&self, quest: &Quest) -> Result<(), sqlx::Error> {
        let tokens_json = serde_json::to_string(
            &quest.tokens.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        )
        .expect("token list serializes");

        sqlx::query(
            r#"
            INSERT INTO quests
            (id, name, entry_fee, prize_pool, start_ms, end_ms, max_participants,
             participant_count, tokens, status, created_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(quest.id.as_str())
        .bind(&quest.name)
        .bind(quest.entry_fee.to_canonical_string())
        .bind(quest.prize_pool.to_canonical_string())
        .bind(quest.start_ms.as_i64())
        .bind(quest.end_ms.as_i64())
        .bind(quest.max_participants.map(|m| m as i64))
        .bind(quest.participant_count as i64)
        .bind(tokens_json)
        .bind(quest.status_at(TimeMs::now()).as_str())
        .bind(quest.created_ms.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load a quest by id.
    pub async fn get_quest(&self, id: &QuestId) -> Result<Option<Quest>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM quests WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(quest_from_row))
    }

    /// List all quests ordered by start time, then id for determinism.
    pub async fn list_quests(&self) -> Result<Vec<Quest>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM quests ORDER BY start_ms ASC, id ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(quest_from_row).collect())
    }

    /// Bump the participant count, guarded by the capacity limit.
    ///
    /// Returns false when the quest is already at `max_participants`
    /// (or does not exist).
    pub async fn try_increment_participant_count(
        &self,
        id: &QuestId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE quests
            SET participant_count = participant_count + 1
            WHERE id = ?
              AND (max_participants IS NULL OR participant_count < max_participants)
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Release a capacity slot claimed by a join that could not complete.
    ///
    /// The floor guard keeps the count from going negative if the claim was
    /// never taken.
    pub async fn release_participant_slot(&self, id: &QuestId) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE quests
            SET participant_count = participant_count - 1
            WHERE id = ? AND participant_count > 0
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Quests whose trading window has opened but whose start snapshot has
    /// not been captured yet.
    pub async fn list_due_for_activation(&self, now: TimeMs) -> Result<Vec<Quest>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM quests
            WHERE start_ms <= ? AND activated_ms IS NULL
            ORDER BY start_ms ASC, id ASC
            "#,
        )
        .bind(now.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(quest_from_row).collect())
    }

    /// Stamp activation. Returns false if another sweep got there first.
    pub async fn mark_activated(&self, id: &QuestId, now: TimeMs) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE quests
            SET activated_ms = ?, status = 'active'
            WHERE id = ? AND activated_ms IS NULL
            "#,
        )
        .bind(now.as_i64())
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Quests past their end time that have not been settled.
    pub async fn list_due_for_settlement(&self, now: TimeMs) -> Result<Vec<Quest>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM quests
            WHERE end_ms <= ? AND settled_ms IS NULL
            ORDER BY end_ms ASC, id ASC
            "#,
        )
        .bind(now.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(quest_from_row).collect())
    }

    /// Commit a settlement: the settled stamp, the fingerprint, and every
    /// entry's final rank and prize land in one transaction.
    ///
    /// The `settled_ms IS NULL` guard makes this a single-winner operation:
    /// a concurrent double-fire commits once and the loser rolls back with
    /// `false`. A crash before the commit leaves the quest unclaimed with no
    /// partial results.
    pub async fn finalize_settlement(
        &self,
        quest_id: &QuestId,
        leaderboard: &[LeaderboardEntry],
        hash: &str,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE quests
            SET settled_ms = ?, status = 'ended', settlement_hash = ?
            WHERE id = ? AND settled_ms IS NULL
            "#,
        )
        .bind(now.as_i64())
        .bind(hash)
        .bind(quest_id.as_str())
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for entry in leaderboard {
            sqlx::query(
                r#"
                UPDATE quest_entries
                SET final_rank = ?, prize_won = ?
                WHERE quest_id = ? AND participant_id = ?
                "#,
            )
            .bind(entry.rank as i64)
            .bind(entry.prize_won.to_canonical_string())
            .bind(quest_id.as_str())
            .bind(entry.participant_id.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    // =========================================================================
    // Entry operations
    // =========================================================================

    /// Insert a quest entry idempotently.
    ///
    /// Returns false when the (quest, participant) pair already joined.
    pub async fn insert_entry(&self, entry: &QuestEntry) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO quest_entries (quest_id, participant_id, joined_ms, fee_paid, fee_tx_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(quest_id, participant_id) DO NOTHING
            "#,
        )
        .bind(entry.quest_id.as_str())
        .bind(entry.participant_id.as_str())
        .bind(entry.joined_ms.as_i64())
        .bind(entry.fee_paid.to_canonical_string())
        .bind(entry.fee_tx_id.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Load one participant's entry in a quest.
    pub async fn get_entry(
        &self,
        quest_id: &QuestId,
        participant_id: &ParticipantId,
    ) -> Result<Option<QuestEntry>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT * FROM quest_entries WHERE quest_id = ? AND participant_id = ?",
        )
        .bind(quest_id.as_str())
        .bind(participant_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(entry_from_row))
    }

    /// List a quest's entries in join order (the ranking tie-break order).
    pub async fn list_entries(&self, quest_id: &QuestId) -> Result<Vec<QuestEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM quest_entries
            WHERE quest_id = ?
            ORDER BY joined_ms ASC, participant_id ASC
            "#,
        )
        .bind(quest_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }

}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use crate::domain::{
        Decimal, LeaderboardEntry, ParticipantId, Quest, QuestEntry, QuestId, TimeMs, TokenId,
    };
    use std::str::FromStr;

    fn make_quest(start: i64, end: i64, max: Option<u32>) -> Quest {
        Quest::new(
            "test quest".to_string(),
            Decimal::from_str("5").unwrap(),
            Decimal::from_str("100").unwrap(),
            TimeMs::new(start),
            TimeMs::new(end),
            max,
            vec![TokenId::new("APT".to_string()), TokenId::new("BTC".to_string())],
            TimeMs::new(0),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_quest_roundtrip() {
        let (repo, _temp) = setup_test_db().await;
        let quest = make_quest(1000, 2000, Some(10));

        repo.insert_quest(&quest).await.unwrap();
        let loaded = repo.get_quest(&quest.id).await.unwrap().unwrap();

        assert_eq!(loaded, quest);
    }

    #[tokio::test]
    async fn test_get_missing_quest_is_none() {
        let (repo, _temp) = setup_test_db().await;
        let result = repo.get_quest(&QuestId::new("nope".to_string())).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_participant_count_guard_at_capacity() {
        let (repo, _temp) = setup_test_db().await;
        let quest = make_quest(1000, 2000, Some(2));
        repo.insert_quest(&quest).await.unwrap();

        assert!(repo.try_increment_participant_count(&quest.id).await.unwrap());
        assert!(repo.try_increment_participant_count(&quest.id).await.unwrap());
        assert!(!repo.try_increment_participant_count(&quest.id).await.unwrap());

        let loaded = repo.get_quest(&quest.id).await.unwrap().unwrap();
        assert_eq!(loaded.participant_count, 2);
    }

    #[tokio::test]
    async fn test_duplicate_entry_ignored() {
        let (repo, _temp) = setup_test_db().await;
        let quest = make_quest(1000, 2000, None);
        repo.insert_quest(&quest).await.unwrap();

        let entry = QuestEntry::new(
            quest.id.clone(),
            ParticipantId::new("alice".to_string()),
            TimeMs::new(500),
            Decimal::from_str("5").unwrap(),
            None,
        );

        assert!(repo.insert_entry(&entry).await.unwrap());
        assert!(!repo.insert_entry(&entry).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_participant_slot_floors_at_zero() {
        let (repo, _temp) = setup_test_db().await;
        let quest = make_quest(1000, 2000, Some(2));
        repo.insert_quest(&quest).await.unwrap();

        assert!(repo.try_increment_participant_count(&quest.id).await.unwrap());
        repo.release_participant_slot(&quest.id).await.unwrap();
        repo.release_participant_slot(&quest.id).await.unwrap();

        let loaded = repo.get_quest(&quest.id).await.unwrap().unwrap();
        assert_eq!(loaded.participant_count, 0);
    }

    #[tokio::test]
    async fn test_finalize_settlement_single_winner_and_atomic() {
        let (repo, _temp) = setup_test_db().await;
        let quest = make_quest(1000, 2000, None);
        repo.insert_quest(&quest).await.unwrap();

        let alice = ParticipantId::new("alice".to_string());
        let entry = QuestEntry::new(
            quest.id.clone(),
            alice.clone(),
            TimeMs::new(500),
            Decimal::from_str("5").unwrap(),
            None,
        );
        repo.insert_entry(&entry).await.unwrap();

        let board = vec![LeaderboardEntry {
            rank: 1,
            participant_id: alice.clone(),
            total_investment: Decimal::from_str("10").unwrap(),
            total_value: Decimal::from_str("12").unwrap(),
            pnl: Decimal::from_str("2").unwrap(),
            pnl_percent: Decimal::from_str("20").unwrap(),
            prize_won: Decimal::from_str("50").unwrap(),
            provisional: false,
        }];

        assert!(repo
            .finalize_settlement(&quest.id, &board, "abc123", TimeMs::new(3000))
            .await
            .unwrap());
        // the second commit loses the claim and must not rewrite anything
        assert!(!repo
            .finalize_settlement(&quest.id, &board, "different", TimeMs::new(3001))
            .await
            .unwrap());

        let loaded = repo.get_quest(&quest.id).await.unwrap().unwrap();
        assert_eq!(loaded.settled_ms, Some(TimeMs::new(3000)));
        assert_eq!(loaded.settlement_hash.as_deref(), Some("abc123"));

        let entry = repo.get_entry(&quest.id, &alice).await.unwrap().unwrap();
        assert_eq!(entry.final_rank, Some(1));
        assert_eq!(entry.prize_won, Some(Decimal::from_str("50").unwrap()));
    }

    #[tokio::test]
    async fn test_due_lists_respect_guards() {
        let (repo, _temp) = setup_test_db().await;
        let quest = make_quest(1000, 2000, None);
        repo.insert_quest(&quest).await.unwrap();

        let due = repo.list_due_for_activation(TimeMs::new(999)).await.unwrap();
        assert!(due.is_empty());

        let due = repo.list_due_for_activation(TimeMs::new(1000)).await.unwrap();
        assert_eq!(due.len(), 1);

        assert!(repo.mark_activated(&quest.id, TimeMs::new(1000)).await.unwrap());
        let due = repo.list_due_for_activation(TimeMs::new(1500)).await.unwrap();
        assert!(due.is_empty());

        let due = repo.list_due_for_settlement(TimeMs::new(2000)).await.unwrap();
        assert_eq!(due.len(), 1);
    }
}
