use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::orchestration::TradeError;

/// HTTP-facing error. Each variant carries a machine-readable kind so
/// clients can branch without parsing messages.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {1}")]
    BadRequest(&'static str, String),
    #[error("Not found: {1}")]
    NotFound(&'static str, String),
    #[error("Conflict: {1}")]
    Conflict(&'static str, String),
    #[error("Bad gateway: {1}")]
    BadGateway(&'static str, String),
    #[error("Internal server error: {1}")]
    Internal(&'static str, String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal("store", err.to_string())
    }
}

impl From<TradeError> for AppError {
    fn from(err: TradeError) -> Self {
        let message = err.to_string();
        match err {
            TradeError::Validation(_) => AppError::BadRequest("validation", message),
            TradeError::QuestNotFound(_) => AppError::NotFound("quest_not_found", message),
            TradeError::NotAParticipant { .. } => {
                AppError::NotFound("not_a_participant", message)
            }
            TradeError::HoldingNotFound { .. } => {
                AppError::NotFound("holding_not_found", message)
            }
            TradeError::RegistrationClosed(_) => {
                AppError::Conflict("registration_closed", message)
            }
            TradeError::TradingClosed { .. } => AppError::Conflict("trading_closed", message),
            TradeError::QuestFull(_) => AppError::Conflict("quest_full", message),
            TradeError::AlreadyJoined { .. } => AppError::Conflict("already_joined", message),
            TradeError::Oracle(_) => AppError::BadGateway("oracle", message),
            TradeError::Transfer(_) => AppError::BadGateway("transfer", message),
            TradeError::Store(_) => AppError::Internal("store", message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::BadRequest(kind, msg) => (StatusCode::BAD_REQUEST, kind, msg),
            AppError::NotFound(kind, msg) => (StatusCode::NOT_FOUND, kind, msg),
            AppError::Conflict(kind, msg) => (StatusCode::CONFLICT, kind, msg),
            AppError::BadGateway(kind, msg) => (StatusCode::BAD_GATEWAY, kind, msg),
            AppError::Internal(kind, msg) => (StatusCode::INTERNAL_SERVER_ERROR, kind, msg),
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;

    #[test]
    fn test_trade_error_status_mapping() {
        let cases: Vec<(TradeError, StatusCode)> = vec![
            (
                TradeError::Validation("bad quantity".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                TradeError::QuestNotFound("q1".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                TradeError::QuestFull("q1".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                TradeError::Oracle(OracleError::PriceUnavailable("APT".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
