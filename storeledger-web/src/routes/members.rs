//! Company member routes

use axum::extract::{Json, Path, State};
use axum::routing::{get, put};
use axum::Router;
use axum_extra::extract::WithRejection;

use storeledger_core::domain::{MemberUpdate, Profile};
use storeledger_core::services::LogEvent;

use super::Body;
use crate::error::{ok, ApiJson, ApiResult};
use crate::session::Authenticated;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/members", get(list))
        .route("/api/members/{id}", put(update))
}

async fn list(
    State(state): State<AppState>,
    auth: Authenticated,
) -> ApiResult<ApiJson<Vec<Profile>>> {
    let members = state.ledger.member_service.list(&auth.ctx).await?;
    Ok(ok(members))
}

async fn update(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
    WithRejection(Json(input), _): Body<MemberUpdate>,
) -> ApiResult<ApiJson<Profile>> {
    let profile = state.ledger.member_service.update(&auth.ctx, &id, input).await?;
    state.record(LogEvent::new("member_updated")).await;
    Ok(ok(profile))
}
