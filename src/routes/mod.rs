// ============================================================================
// LEDGER HTTP SURFACE
// ============================================================================
//
// Serves the trusted ledger to `HttpBackend` clients.
//
// Route Organization:
// - bids.rs:    Batch placement, bid history
// - wallet.rs:  Balance, withdrawals, payout profile
// - admin.rs:   Health, operator credit, market listing
//
// Rejections come back with a regular JSON body and a 4xx status, so the
// client can always decode the reason.
//
// ============================================================================

pub mod admin;
pub mod bids;
pub mod wallet;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::ledger::Ledger;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    /// Bearer token required on every route but `/health` when set.
    pub api_token: Option<String>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, api_token: Option<String>) -> Self {
        Self { ledger, api_token }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        // Bids
        .route("/bids", post(bids::place_bids_handler))
        .route("/user_bid_history", post(bids::bid_history_handler))
        // Wallet
        .route("/balance/{user_id}", get(wallet::balance_handler))
        .route("/withdraw_funds", post(wallet::withdraw_handler))
        .route("/withdrawals/{user_id}/pending", get(wallet::pending_withdrawals_handler))
        .route("/get_bank_info", post(wallet::bank_info_handler))
        .route("/add_bank_info", post(wallet::add_bank_info_handler))
        .route("/add_upi_number", post(wallet::add_upi_number_handler))
        // Markets
        .route("/markets", get(admin::markets_handler))
        // Admin
        .route("/admin/credit", post(admin::credit_handler))
        .route("/admin/markets", put(admin::replace_markets_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(admin::health_handler))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_token.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(expected) {
        next.run(request).await
    } else {
        warn!(path = %request.uri().path(), "🚫 Missing or invalid API token");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}
