//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth_middleware};

pub mod accounts;
pub mod categories;
pub mod health;
pub mod reports;
pub mod response;
pub mod transactions;

/// Creates the API router: public health check plus the authenticated
/// ledger routes.
pub fn api_routes() -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(transactions::routes())
        .merge(accounts::routes())
        .merge(categories::routes())
        .merge(reports::routes())
        .layer(middleware::from_fn(auth_middleware));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}
