//! Report routes: financial summary, income statement (DRE) and balance
//! integrity.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use saldo_core::reports::{DateRange, Regime, ReportError};
use saldo_shared::Permission;
use serde::{Deserialize, Serialize};

use super::response::{app_error_response, ledger_error_response};
use crate::{AppState, middleware::AuthUser};

/// Creates the report routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/summary", get(get_summary))
        .route("/reports/dre", get(get_dre))
        .route("/reports/integrity", get(get_integrity))
}

/// Query parameters for the summary.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// First day included (YYYY-MM-DD).
    pub from: Option<NaiveDate>,
    /// Last day included (YYYY-MM-DD).
    pub to: Option<NaiveDate>,
    /// `competence` (default) or `cash`.
    pub basis: Option<String>,
}

/// Query parameters for the income statement.
#[derive(Debug, Deserialize)]
pub struct DreQuery {
    /// Month in `YYYY-MM`.
    pub month: String,
    /// `competence` (default) or `cash`.
    pub regime: Option<String>,
}

/// Integrity check response.
#[derive(Debug, Serialize)]
pub struct IntegrityResponse {
    /// True when every stored balance matches the log.
    pub consistent: bool,
    /// Number of accounts compared.
    pub accounts_checked: usize,
    /// Accounts that diverge.
    pub divergences: Vec<saldo_core::ledger::BalanceDivergence>,
}

fn parse_regime(raw: Option<&str>) -> Result<Regime, ReportError> {
    raw.map_or(Ok(Regime::default()), |value| value.parse())
}

fn summary_range(query: &SummaryQuery) -> Result<Option<DateRange>, ReportError> {
    match (query.from, query.to) {
        (None, None) => Ok(None),
        (from, to) => DateRange::new(
            from.unwrap_or(NaiveDate::MIN),
            to.unwrap_or(NaiveDate::MAX),
        )
        .map(Some),
    }
}

/// GET `/reports/summary` - Realized, pending and projected totals.
async fn get_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    if let Err(response) = auth.require(Permission::ViewReports) {
        return response;
    }

    let basis = match parse_regime(query.basis.as_deref()) {
        Ok(basis) => basis,
        Err(e) => return app_error_response(e),
    };
    let range = match summary_range(&query) {
        Ok(range) => range,
        Err(e) => return app_error_response(e),
    };

    match state.engine.summarize(auth.user_id(), range, basis).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// GET `/reports/dre` - Income statement for one month.
async fn get_dre(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DreQuery>,
) -> impl IntoResponse {
    if let Err(response) = auth.require(Permission::ViewReports) {
        return response;
    }

    let regime = match parse_regime(query.regime.as_deref()) {
        Ok(regime) => regime,
        Err(e) => return app_error_response(e),
    };
    let month = match DateRange::parse_month(&query.month) {
        Ok(month) => month,
        Err(e) => return app_error_response(e),
    };

    match state.engine.dre(auth.user_id(), month, regime).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// GET `/reports/integrity` - Compare stored balances with the log.
async fn get_integrity(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(response) = auth.require(Permission::ViewReports) {
        return response;
    }

    match state.engine.verify_balances(auth.user_id()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(IntegrityResponse {
                consistent: report.is_consistent(),
                accounts_checked: report.accounts_checked,
                divergences: report.divergences,
            }),
        )
            .into_response(),
        Err(e) => ledger_error_response(e),
    }
}
