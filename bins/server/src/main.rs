//! Saldo API Server
//!
//! Main entry point for the Saldo ledger service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use saldo_api::{AppState, create_router};
use saldo_core::ledger::{LedgerEngine, LedgerSettings};
use saldo_db::{LedgerRepository, connect_with_config};
use saldo_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing; LOG_FORMAT=json switches to structured output
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "saldo=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect_with_config(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    let settings = LedgerSettings::from(&config.ledger);
    info!(
        settlement_epsilon = %settings.settlement_epsilon,
        fixed_horizon_months = settings.fixed_horizon_months,
        max_installments = settings.max_installments,
        "Ledger engine configured"
    );
    let engine = LedgerEngine::new(Arc::new(LedgerRepository::new(db)), settings);

    let state = AppState {
        engine: Arc::new(engine),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
