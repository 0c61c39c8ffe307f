//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes over the ledger engine
//! - Header-based authentication middleware
//! - JSON error responses

pub mod middleware;
pub mod routes;

use axum::Router;
use saldo_core::ledger::LedgerEngine;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Ledger engine; owns the store and the per-user locks.
    pub engine: Arc<LedgerEngine>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
