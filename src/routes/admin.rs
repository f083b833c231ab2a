use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::backend::UserId;
use crate::ledger::LedgerError;
use crate::market::MarketSession;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": VERSION,
        "markets": state.ledger.markets().len(),
        "accounts": state.ledger.account_count(),
    }))
}

pub async fn markets_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.ledger.markets())
}

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    pub user_id: UserId,
    pub amount: u64,
}

pub async fn credit_handler(
    State(state): State<AppState>,
    Json(req): Json<CreditRequest>,
) -> impl IntoResponse {
    match state.ledger.credit(req.user_id, req.amount).await {
        Ok(balance) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "user_id": req.user_id,
                "credited": req.amount,
                "balance": balance,
            })),
        ),
        Err(e) => {
            let status = match e {
                LedgerError::ZeroCredit => StatusCode::BAD_REQUEST,
                LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(serde_json::json!({ "success": false, "error": e.to_string() })))
        }
    }
}

pub async fn replace_markets_handler(
    State(state): State<AppState>,
    Json(markets): Json<Vec<MarketSession>>,
) -> impl IntoResponse {
    let count = markets.len();
    state.ledger.replace_markets(markets);
    Json(serde_json::json!({ "success": true, "markets": count }))
}
