//! Report routes

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::WithRejection;

use storeledger_core::services::{
    CashFlowReport, Dashboard, ProfitLossReport, ReportQuery, StoreMetricsReport,
};

use super::Params;
use crate::error::{ok, ApiJson, ApiResult};
use crate::session::Authenticated;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports/profit-loss", get(profit_loss))
        .route("/api/reports/cash-flow", get(cash_flow))
        .route("/api/reports/stores", get(store_metrics))
        .route("/api/reports/dashboard", get(dashboard))
}

async fn profit_loss(
    State(state): State<AppState>,
    auth: Authenticated,
    WithRejection(Query(query), _): Params<ReportQuery>,
) -> ApiResult<ApiJson<ProfitLossReport>> {
    let report = state.ledger.report_service.profit_loss(&auth.ctx, &query).await?;
    Ok(ok(report))
}

async fn cash_flow(
    State(state): State<AppState>,
    auth: Authenticated,
    WithRejection(Query(query), _): Params<ReportQuery>,
) -> ApiResult<ApiJson<CashFlowReport>> {
    let report = state.ledger.report_service.cash_flow(&auth.ctx, &query).await?;
    Ok(ok(report))
}

async fn store_metrics(
    State(state): State<AppState>,
    auth: Authenticated,
    WithRejection(Query(query), _): Params<ReportQuery>,
) -> ApiResult<ApiJson<StoreMetricsReport>> {
    let report = state.ledger.report_service.store_metrics(&auth.ctx, &query).await?;
    Ok(ok(report))
}

async fn dashboard(
    State(state): State<AppState>,
    auth: Authenticated,
    WithRejection(Query(query), _): Params<ReportQuery>,
) -> ApiResult<ApiJson<Dashboard>> {
    let report = state.ledger.report_service.dashboard(&auth.ctx, &query).await?;
    Ok(ok(report))
}
