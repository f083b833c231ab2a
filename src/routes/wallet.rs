use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::error;

use super::AppState;
use crate::backend::{
    BalanceResponse, BankDetails, ProfileRequest, ProfileResponse, StoreResponse, UpiNumbers,
    UserId, WithdrawalRequest, WithdrawalResponse,
};
use crate::ledger::LedgerResult;

pub async fn balance_handler(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> impl IntoResponse {
    let balance = state.ledger.balance(user_id).await;
    Json(BalanceResponse { user_id, balance })
}

pub async fn withdraw_handler(
    State(state): State<AppState>,
    Json(request): Json<WithdrawalRequest>,
) -> impl IntoResponse {
    match state.ledger.request_withdrawal(&request).await {
        Ok(reply) if reply.status => (StatusCode::OK, Json(reply)),
        Ok(reply) => (StatusCode::BAD_REQUEST, Json(reply)),
        Err(e) => {
            error!(token = %request.idempotency_key, error = %e, "Withdrawal failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WithdrawalResponse {
                    status: false,
                    message: e.to_string(),
                }),
            )
        }
    }
}

pub async fn pending_withdrawals_handler(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> impl IntoResponse {
    Json(state.ledger.pending_withdrawals(user_id))
}

pub async fn bank_info_handler(
    State(state): State<AppState>,
    Json(request): Json<ProfileRequest>,
) -> impl IntoResponse {
    let body = match state.ledger.profile(request.user_id) {
        Some(profile) => ProfileResponse {
            success: true,
            error: None,
            profile,
        },
        None => ProfileResponse {
            success: false,
            error: Some("No bank details found".to_string()),
            profile: Default::default(),
        },
    };
    Json(body)
}

pub async fn add_bank_info_handler(
    State(state): State<AppState>,
    Json(details): Json<BankDetails>,
) -> impl IntoResponse {
    store_reply(state.ledger.store_bank_details(&details))
}

pub async fn add_upi_number_handler(
    State(state): State<AppState>,
    Json(numbers): Json<UpiNumbers>,
) -> impl IntoResponse {
    store_reply(state.ledger.store_upi_numbers(&numbers))
}

fn store_reply(result: LedgerResult<StoreResponse>) -> (StatusCode, Json<StoreResponse>) {
    match result {
        Ok(reply) if reply.success => (StatusCode::OK, Json(reply)),
        Ok(reply) => (StatusCode::BAD_REQUEST, Json(reply)),
        Err(e) => {
            error!(error = %e, "Payout profile write failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StoreResponse {
                    success: false,
                    message: e.to_string(),
                }),
            )
        }
    }
}
