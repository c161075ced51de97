//! Category routes

use axum::extract::{Json, Path, State};
use axum::routing::{delete, get};
use axum::Router;
use axum_extra::extract::WithRejection;

use storeledger_core::domain::{Category, NewCategory};

use super::Body;
use crate::error::{ok, ApiJson, ApiResult};
use crate::session::Authenticated;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list).post(create))
        .route("/api/categories/{id}", delete(remove))
}

async fn list(
    State(state): State<AppState>,
    auth: Authenticated,
) -> ApiResult<ApiJson<Vec<Category>>> {
    let categories = state.ledger.category_service.list(&auth.ctx).await?;
    Ok(ok(categories))
}

async fn create(
    State(state): State<AppState>,
    auth: Authenticated,
    WithRejection(Json(input), _): Body<NewCategory>,
) -> ApiResult<ApiJson<Category>> {
    let category = state.ledger.category_service.create(&auth.ctx, input).await?;
    Ok(ok(category))
}

async fn remove(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> ApiResult<ApiJson<()>> {
    state.ledger.category_service.delete(&auth.ctx, &id).await?;
    Ok(ok(()))
}
