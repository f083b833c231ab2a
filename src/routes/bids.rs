use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::error;

use super::AppState;
use crate::backend::{BidHistoryQuery, BidHistoryResponse, BidResponse, BidSubmission};

pub async fn place_bids_handler(
    State(state): State<AppState>,
    Json(submission): Json<BidSubmission>,
) -> impl IntoResponse {
    match state.ledger.place_bids(&submission).await {
        Ok(reply) if reply.success => (StatusCode::OK, Json(reply)),
        Ok(reply) => (StatusCode::BAD_REQUEST, Json(reply)),
        Err(e) => {
            error!(token = %submission.idempotency_key, error = %e, "Bid placement failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BidResponse {
                    success: false,
                    error_msg: e.to_string(),
                }),
            )
        }
    }
}

pub async fn bid_history_handler(
    State(state): State<AppState>,
    Json(query): Json<BidHistoryQuery>,
) -> impl IntoResponse {
    Json(BidHistoryResponse {
        status: 1,
        bids: state.ledger.bid_history(&query),
    })
}
