use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{Decimal, Quest, QuestId, TimeMs, TokenId};
use crate::error::AppError;
use crate::orchestration::NewQuest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestRequest {
    pub name: String,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    pub start_ms: i64,
    pub end_ms: i64,
    pub max_participants: Option<u32>,
    pub tokens: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestResponse {
    pub id: String,
    pub name: String,
    pub status: String,
    pub entry_fee: Decimal,
    pub prize_pool: Decimal,
    pub start_ms: i64,
    pub end_ms: i64,
    pub max_participants: Option<u32>,
    pub participant_count: u32,
    pub tokens: Vec<String>,
    pub created_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_hash: Option<String>,
}

impl QuestResponse {
    pub fn from_quest(quest: &Quest, now: TimeMs) -> Self {
        QuestResponse {
            id: quest.id.as_str().to_string(),
            name: quest.name.clone(),
            status: quest.status_at(now).as_str().to_string(),
            entry_fee: quest.entry_fee,
            prize_pool: quest.prize_pool,
            start_ms: quest.start_ms.as_i64(),
            end_ms: quest.end_ms.as_i64(),
            max_participants: quest.max_participants,
            participant_count: quest.participant_count,
            tokens: quest.tokens.iter().map(|t| t.as_str().to_string()).collect(),
            created_ms: quest.created_ms.as_i64(),
            settled_ms: quest.settled_ms.map(|t| t.as_i64()),
            settlement_hash: quest.settlement_hash.clone(),
        }
    }
}

pub async fn create_quest(
    State(state): State<AppState>,
    Json(request): Json<CreateQuestRequest>,
) -> Result<Json<QuestResponse>, AppError> {
    let quest = state
        .service
        .create_quest(NewQuest {
            name: request.name,
            entry_fee: request.entry_fee,
            prize_pool: request.prize_pool,
            start_ms: TimeMs::new(request.start_ms),
            end_ms: TimeMs::new(request.end_ms),
            max_participants: request.max_participants,
            tokens: request.tokens.into_iter().map(TokenId::new).collect(),
        })
        .await?;

    Ok(Json(QuestResponse::from_quest(&quest, TimeMs::now())))
}

pub async fn list_quests(
    State(state): State<AppState>,
) -> Result<Json<Vec<QuestResponse>>, AppError> {
    let now = TimeMs::now();
    let quests = state.service.list_quests().await?;

    Ok(Json(
        quests
            .iter()
            .map(|q| QuestResponse::from_quest(q, now))
            .collect(),
    ))
}

pub async fn get_quest(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<QuestResponse>, AppError> {
    let quest = state.service.get_quest(&QuestId::new(id)).await?;
    Ok(Json(QuestResponse::from_quest(&quest, TimeMs::now())))
}
