use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::domain::TimeMs;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickResponse {
    pub activated: usize,
    pub settled: usize,
}

/// Run one lifecycle sweep now. Safe to call concurrently with the
/// background loop; all transitions are idempotent.
pub async fn tick(State(state): State<AppState>) -> Result<Json<TickResponse>, AppError> {
    let outcome = state.sweeper.tick(TimeMs::now()).await?;

    Ok(Json(TickResponse {
        activated: outcome.activated,
        settled: outcome.settled,
    }))
}
