// ============================================================================
// LEDGER GUARD - SETTLEMENT SERVER
// ============================================================================
//
// Serves the trusted ledger: batch bids, withdrawals, balances, payout
// profiles and the market listing.
//
// Storage: in-memory, or ReDB when LEDGER_DATA_PATH is set
//
// Run:  cargo run
// Test: curl http://localhost:8080/health

use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ledger_guard::{build_router, AppConfig, AppState, Ledger, SystemClock};

// ============================================================================
// GRACEFUL SHUTDOWN
// ============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("🛑 Shutdown signal received");
}

// ============================================================================
// MAIN
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,ledger_guard=debug")))
        .with(tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true))
        .init();

    // 2. Configuration
    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "❌ Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!("╔══════════════════════════════════════════════════════╗");
    info!("║            LEDGER GUARD - SETTLEMENT SERVER          ║");
    info!("╚══════════════════════════════════════════════════════╝");
    info!(
        min = config.withdrawal.min_amount,
        max = config.withdrawal.max_amount,
        open = %config.withdrawal.open_time,
        close = %config.withdrawal.close_time,
        "💸 Withdrawal policy"
    );

    // 3. Ledger (ReDB when configured)
    let clock = Arc::new(SystemClock);
    let ledger = match &config.data_path {
        Some(path) => match Ledger::open(path, config.withdrawal.clone(), clock) {
            Ok(l) => {
                info!(path = %path, "💾 Ledger opened");
                l
            }
            Err(e) => {
                error!(path = %path, error = %e, "❌ Failed to open ledger");
                return ExitCode::FAILURE;
            }
        },
        None => {
            warn!("No LEDGER_DATA_PATH set, ledger is in-memory only");
            Ledger::new(config.withdrawal.clone(), clock)
        }
    };

    // 4. Router
    let state = AppState::new(Arc::new(ledger), config.api_token.clone());
    if state.api_token.is_none() {
        warn!("No LEDGER_API_TOKEN set, routes are unauthenticated");
    }
    let app = build_router(state);

    // 5. Serve
    info!("🎯 BIDS:");
    info!("   POST /bids                      Place a batch");
    info!("   POST /user_bid_history          Bid history");
    info!("💰 WALLET:");
    info!("   GET  /balance/{{user_id}}          Balance");
    info!("   POST /withdraw_funds            Request withdrawal");
    info!("   GET  /withdrawals/{{user_id}}/pending");
    info!("   POST /get_bank_info | /add_bank_info | /add_upi_number");
    info!("🎰 ADMIN:");
    info!("   POST /admin/credit              Credit an account");
    info!("   PUT  /admin/markets             Publish market listing");

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "❌ Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %config.bind_addr, "🚀 Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    info!("✅ Server shutdown complete");
    ExitCode::SUCCESS
}
