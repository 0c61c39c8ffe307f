//! Transaction routes: create, edit, settle, delete and list.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use saldo_core::ledger::{DeleteOutcome, SettlementInput, TransactionInput};
use saldo_shared::{
    Permission,
    types::{AccountId, PageRequest, TransactionId},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::response::{ledger_error_response, operation_id};
use crate::{AppState, middleware::AuthUser};

/// Creates the transaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route(
            "/transactions/{transaction_id}",
            put(update_transaction).delete(delete_transaction),
        )
        .route("/transactions/{transaction_id}/settle", post(settle_transaction))
}

/// Query parameters for deleting a transaction.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    /// Also delete the settlements of a root.
    #[serde(default)]
    pub force: bool,
}

/// Request body for settling a root.
#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    /// Amount actually paid or received.
    pub actual_amount: Decimal,
    /// Date the money moved.
    pub payment_date: NaiveDate,
    /// Account the money moved through.
    pub account_id: AccountId,
    /// Payment method.
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-text observation.
    #[serde(default)]
    pub observation: Option<String>,
    /// Reference to an uploaded receipt.
    #[serde(default)]
    pub receipt_ref: Option<String>,
}

/// GET `/transactions` - Roots with their settlement state, newest first.
async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> impl IntoResponse {
    if let Err(response) =
        auth.require_any(&[Permission::ManageTransactions, Permission::ViewReports])
    {
        return response;
    }

    match state.engine.list_ledger(auth.user_id()).await {
        Ok(lines) => (StatusCode::OK, Json(page.paginate(lines))).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// POST `/transactions` - Create a transaction (or a recurring series).
async fn create_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<TransactionInput>,
) -> impl IntoResponse {
    if let Err(response) = auth.require(Permission::ManageTransactions) {
        return response;
    }
    let operation = match operation_id(&headers) {
        Ok(operation) => operation,
        Err(response) => return response,
    };

    match state
        .engine
        .save_transaction(auth.user_id(), payload, None, operation)
        .await
    {
        Ok(outcome) => {
            let status = if outcome.replayed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, Json(outcome)).into_response()
        }
        Err(e) => ledger_error_response(e),
    }
}

/// PUT `/transactions/{transaction_id}` - Edit a root.
async fn update_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(transaction_id): Path<TransactionId>,
    Json(payload): Json<TransactionInput>,
) -> impl IntoResponse {
    if let Err(response) = auth.require(Permission::ManageTransactions) {
        return response;
    }
    let operation = match operation_id(&headers) {
        Ok(operation) => operation,
        Err(response) => return response,
    };

    match state
        .engine
        .save_transaction(auth.user_id(), payload, Some(transaction_id), operation)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// DELETE `/transactions/{transaction_id}` - Delete, `?force=true` to
/// include settlements.
async fn delete_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(transaction_id): Path<TransactionId>,
    Query(query): Query<DeleteQuery>,
) -> impl IntoResponse {
    if let Err(response) = auth.require(Permission::ManageTransactions) {
        return response;
    }
    let operation = match operation_id(&headers) {
        Ok(operation) => operation,
        Err(response) => return response,
    };

    match state
        .engine
        .delete_transaction(auth.user_id(), transaction_id, query.force, operation)
        .await
    {
        Ok(DeleteOutcome::Blocked { children }) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "BLOCKED",
                "message": format!(
                    "Transaction has {children} settlement(s); delete with force=true to remove them too"
                ),
                "children": children,
            })),
        )
            .into_response(),
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// POST `/transactions/{transaction_id}/settle` - Record a (partial) payment.
async fn settle_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(transaction_id): Path<TransactionId>,
    Json(payload): Json<SettleRequest>,
) -> impl IntoResponse {
    if let Err(response) = auth.require(Permission::ManageTransactions) {
        return response;
    }
    let operation = match operation_id(&headers) {
        Ok(operation) => operation,
        Err(response) => return response,
    };

    let input = SettlementInput {
        root_id: transaction_id,
        actual_amount: payload.actual_amount,
        payment_date: payload.payment_date,
        account_id: payload.account_id,
        payment_method: payload.payment_method,
        tags: payload.tags,
        observation: payload.observation,
        receipt_ref: payload.receipt_ref,
    };

    match state.engine.settle(auth.user_id(), input, operation).await {
        Ok(outcome) => {
            info!(
                user_id = %auth.user_id(),
                transaction_id = %transaction_id,
                state = ?outcome.state,
                "Settlement accepted"
            );
            let status = if outcome.replayed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, Json(outcome)).into_response()
        }
        Err(e) => ledger_error_response(e),
    }
}
