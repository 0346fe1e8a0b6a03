pub mod health;
pub mod leaderboard;
pub mod lifecycle;
pub mod quests;
pub mod trading;

use crate::orchestration::{LifecycleSweeper, QuestService};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QuestService>,
    pub sweeper: Arc<LifecycleSweeper>,
}

impl AppState {
    pub fn new(service: Arc<QuestService>, sweeper: Arc<LifecycleSweeper>) -> Self {
        Self { service, sweeper }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/quests", post(quests::create_quest).get(quests::list_quests))
        .route("/v1/quests/:id", get(quests::get_quest))
        .route("/v1/quests/:id/join", post(trading::join_quest))
        .route("/v1/quests/:id/buy", post(trading::buy))
        .route("/v1/quests/:id/sell", post(trading::sell))
        .route("/v1/quests/:id/portfolio", get(trading::get_portfolio))
        .route("/v1/quests/:id/leaderboard", get(leaderboard::get_leaderboard))
        .route("/v1/lifecycle/tick", post(lifecycle::tick))
        .layer(cors)
        .with_state(state)
}
