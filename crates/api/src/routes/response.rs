//! Shared JSON responses.

use axum::{
    Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use saldo_core::ledger::LedgerError;
use saldo_shared::{AppError, types::OperationId};
use serde_json::json;
use tracing::{error, warn};

/// Header clients use to make a write idempotent.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Maps a ledger error to its JSON response.
pub fn ledger_error_response(err: LedgerError) -> Response {
    let status = status(err.http_status_code());
    if status.is_server_error() {
        error!(error = %err, code = err.error_code(), "Ledger operation failed");
    } else if err.is_retryable() {
        warn!(error = %err, "Ledger operation conflicted");
    }
    (
        status,
        Json(json!({
            "error": err.error_code(),
            "message": err.to_string(),
            "retryable": err.is_retryable(),
        })),
    )
        .into_response()
}

/// Maps an application error to its JSON response.
pub fn app_error_response(err: impl Into<AppError>) -> Response {
    let err = err.into();
    (
        status(err.status_code()),
        Json(json!({
            "error": err.error_code(),
            "message": err.to_string(),
        })),
    )
        .into_response()
}

/// Reads the optional idempotency key.
#[allow(clippy::result_large_err)]
pub fn operation_id(headers: &HeaderMap) -> Result<Option<OperationId>, Response> {
    let Some(raw) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .map(Some)
        .ok_or_else(|| {
            app_error_response(AppError::Validation(
                "idempotency-key must be a UUID".to_string(),
            ))
        })
}
