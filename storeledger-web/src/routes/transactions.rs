//! Transaction routes

use axum::extract::{Json, Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::Router;
use axum_extra::extract::WithRejection;

use storeledger_core::domain::{NewTransaction, Transaction, TransactionUpdate};
use storeledger_core::services::{ExportService, LogEvent, TransactionQuery};

use super::{Body, Params};
use crate::error::{ok, ApiJson, ApiResult};
use crate::session::Authenticated;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/transactions", get(list).post(create))
        .route("/api/transactions/export", get(export))
        .route("/api/transactions/{id}", put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    auth: Authenticated,
    WithRejection(Query(query), _): Params<TransactionQuery>,
) -> ApiResult<ApiJson<Vec<Transaction>>> {
    let txs = state.ledger.transaction_service.list(&auth.ctx, &query).await?;
    Ok(ok(txs))
}

async fn create(
    State(state): State<AppState>,
    auth: Authenticated,
    WithRejection(Json(input), _): Body<NewTransaction>,
) -> ApiResult<ApiJson<Transaction>> {
    let tx = state.ledger.transaction_service.create(&auth.ctx, input).await?;
    state.record(LogEvent::new("transaction_created")).await;
    Ok(ok(tx))
}

async fn update(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
    WithRejection(Json(input), _): Body<TransactionUpdate>,
) -> ApiResult<ApiJson<Transaction>> {
    let tx = state.ledger.transaction_service.update(&auth.ctx, &id, input).await?;
    state.record(LogEvent::new("transaction_updated")).await;
    Ok(ok(tx))
}

async fn remove(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> ApiResult<ApiJson<()>> {
    state.ledger.transaction_service.delete(&auth.ctx, &id).await?;
    state.record(LogEvent::new("transaction_deleted")).await;
    Ok(ok(()))
}

async fn export(
    State(state): State<AppState>,
    auth: Authenticated,
    WithRejection(Query(query), _): Params<TransactionQuery>,
) -> ApiResult<impl IntoResponse> {
    let csv = state.ledger.export_service.export_csv(&auth.ctx, &query).await?;
    state.record(LogEvent::new("transactions_exported")).await;
    let disposition = format!("attachment; filename=\"{}\"", ExportService::file_name(&query));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
