use axum::extract::{Path, State};
use axum::Json;

use crate::api::AppState;
use crate::domain::{LeaderboardEntry, QuestId, TimeMs};
use crate::error::AppError;

/// Quest leaderboard.
///
/// For an ended quest this is the settled ranking; before that it is a live
/// standing valued at current prices, with every entry marked provisional.
pub async fn get_leaderboard(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let board = state
        .service
        .leaderboard(&QuestId::new(id), TimeMs::now())
        .await?;

    Ok(Json(board))
}
