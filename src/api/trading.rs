use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{Decimal, Holding, ParticipantId, QuestId, TimeMs, TokenId};
use crate::error::AppError;
use crate::orchestration::ValuedHolding;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub participant_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub quest_id: String,
    pub participant_id: String,
    pub joined_ms: i64,
    pub fee_paid: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_tx_id: Option<String>,
}

pub async fn join_quest(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    let entry = state
        .service
        .join(
            &QuestId::new(id),
            &ParticipantId::new(request.participant_id),
            TimeMs::now(),
        )
        .await?;

    Ok(Json(JoinResponse {
        quest_id: entry.quest_id.as_str().to_string(),
        participant_id: entry.participant_id.as_str().to_string(),
        joined_ms: entry.joined_ms.as_i64(),
        fee_paid: entry.fee_paid,
        fee_tx_id: entry.fee_tx_id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub participant_id: String,
    pub token: String,
    pub quantity: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingDto {
    pub token: String,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    pub average_cost: Decimal,
    pub entry_price: Decimal,
}

impl HoldingDto {
    fn from_holding(holding: &Holding) -> Self {
        HoldingDto {
            token: holding.token_id.as_str().to_string(),
            quantity: holding.quantity,
            total_cost: holding.total_cost,
            average_cost: holding.average_cost(),
            entry_price: holding.entry_price,
        }
    }
}

pub async fn buy(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<HoldingDto>, AppError> {
    let holding = state
        .service
        .buy(
            &QuestId::new(id),
            &ParticipantId::new(request.participant_id),
            &TokenId::new(request.token),
            request.quantity,
            TimeMs::now(),
        )
        .await?;

    Ok(Json(HoldingDto::from_holding(&holding)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellResponse {
    pub token: String,
    /// Actually-sold quantity; less than requested when the request
    /// exceeded the held amount.
    pub sold: Decimal,
    pub cost_removed: Decimal,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<HoldingDto>,
}

pub async fn sell(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<TradeRequest>,
) -> Result<Json<SellResponse>, AppError> {
    let token = TokenId::new(request.token);
    let result = state
        .service
        .sell(
            &QuestId::new(id),
            &ParticipantId::new(request.participant_id),
            &token,
            request.quantity,
            TimeMs::now(),
        )
        .await?;

    Ok(Json(SellResponse {
        token: token.as_str().to_string(),
        sold: result.sold,
        cost_removed: result.cost_removed,
        closed: result.remaining.is_none(),
        remaining: result.remaining.as_ref().map(HoldingDto::from_holding),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioQuery {
    pub participant_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHolding {
    #[serde(flatten)]
    pub holding: HoldingDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Decimal>,
    pub current_value: Decimal,
    pub unrealized_pnl: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub quest_id: String,
    pub participant_id: String,
    pub holdings: Vec<PortfolioHolding>,
    pub total_investment: Decimal,
    pub total_value: Decimal,
}

pub async fn get_portfolio(
    Path(id): Path<String>,
    Query(params): Query<PortfolioQuery>,
    State(state): State<AppState>,
) -> Result<Json<PortfolioResponse>, AppError> {
    let quest_id = QuestId::new(id);
    let participant_id = ParticipantId::new(params.participant_id);

    let valued = state
        .service
        .portfolio(&quest_id, &participant_id, TimeMs::now())
        .await?;

    let mut total_investment = Decimal::zero();
    let mut total_value = Decimal::zero();
    let holdings = valued
        .iter()
        .map(|v: &ValuedHolding| {
            total_investment = total_investment + v.holding.total_cost;
            total_value = total_value + v.current_value;
            PortfolioHolding {
                holding: HoldingDto::from_holding(&v.holding),
                current_price: v.current_price,
                current_value: v.current_value,
                unrealized_pnl: v.current_value - v.holding.total_cost,
            }
        })
        .collect();

    Ok(Json(PortfolioResponse {
        quest_id: quest_id.as_str().to_string(),
        participant_id: participant_id.as_str().to_string(),
        holdings,
        total_investment,
        total_value,
    }))
}
