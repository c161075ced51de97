//! Store routes

use axum::extract::{Json, Path, State};
use axum::routing::{get, put};
use axum::Router;
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use storeledger_core::domain::Store;

use super::Body;
use crate::error::{ok, ApiJson, ApiResult};
use crate::session::Authenticated;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/stores", get(list).post(create))
        .route("/api/stores/{id}", put(rename).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct StoreRequest {
    pub name: String,
}

async fn list(
    State(state): State<AppState>,
    auth: Authenticated,
) -> ApiResult<ApiJson<Vec<Store>>> {
    let stores = state.ledger.store_service.list(&auth.ctx).await?;
    Ok(ok(stores))
}

async fn create(
    State(state): State<AppState>,
    auth: Authenticated,
    WithRejection(Json(input), _): Body<StoreRequest>,
) -> ApiResult<ApiJson<Store>> {
    let store = state.ledger.store_service.create(&auth.ctx, &input.name).await?;
    Ok(ok(store))
}

async fn rename(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
    WithRejection(Json(input), _): Body<StoreRequest>,
) -> ApiResult<ApiJson<Store>> {
    let store = state.ledger.store_service.rename(&auth.ctx, &id, &input.name).await?;
    Ok(ok(store))
}

async fn remove(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> ApiResult<ApiJson<()>> {
    state.ledger.store_service.delete(&auth.ctx, &id).await?;
    Ok(ok(()))
}
