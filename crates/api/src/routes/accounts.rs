//! Account routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use saldo_core::ledger::NewAccount;
use saldo_shared::Permission;
use serde_json::json;

use super::response::ledger_error_response;
use crate::{AppState, middleware::AuthUser};

/// Creates the account routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/accounts", get(list_accounts).post(create_account))
}

/// GET `/accounts` - List accounts with their running balances.
async fn list_accounts(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(response) =
        auth.require_any(&[Permission::ManageTransactions, Permission::ViewReports])
    {
        return response;
    }

    match state.engine.list_accounts(auth.user_id()).await {
        Ok(accounts) => (StatusCode::OK, Json(json!({ "data": accounts }))).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// POST `/accounts` - Open an account.
async fn create_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NewAccount>,
) -> impl IntoResponse {
    if let Err(response) = auth.require(Permission::ManageTransactions) {
        return response;
    }

    match state.engine.create_account(auth.user_id(), payload).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(e) => ledger_error_response(e),
    }
}
