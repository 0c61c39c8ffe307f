//! Category routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use saldo_core::ledger::NewCategory;
use saldo_shared::Permission;
use serde_json::json;

use super::response::ledger_error_response;
use crate::{AppState, middleware::AuthUser};

/// Creates the category routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories).post(create_category))
}

async fn list_categories(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(response) =
        auth.require_any(&[Permission::ManageTransactions, Permission::ViewReports])
    {
        return response;
    }

    match state.engine.list_categories(auth.user_id()).await {
        Ok(categories) => (StatusCode::OK, Json(json!({ "data": categories }))).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NewCategory>,
) -> impl IntoResponse {
    if let Err(response) = auth.require(Permission::ManageTransactions) {
        return response;
    }

    match state.engine.create_category(auth.user_id(), payload).await {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(e) => ledger_error_response(e),
    }
}
