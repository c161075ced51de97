//! Route handlers, one module per resource

mod auth;
mod categories;
mod members;
mod reports;
mod stores;
mod system;
mod transactions;

use axum::extract::{Json, Query};
use axum::Router;
use axum_extra::extract::WithRejection;

use crate::error::ApiError;
use crate::AppState;

/// JSON body whose rejections use the API envelope
type Body<T> = WithRejection<Json<T>, ApiError>;

/// Query string whose rejections use the API envelope
type Params<T> = WithRejection<Query<T>, ApiError>;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(system::routes())
        .merge(auth::routes())
        .merge(transactions::routes())
        .merge(categories::routes())
        .merge(stores::routes())
        .merge(members::routes())
        .merge(reports::routes())
}
