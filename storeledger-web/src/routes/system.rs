//! Health and backend information

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use storeledger_core::domain::BackendKind;

use crate::error::{ok, ApiJson};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/backend", get(backend_info))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: BackendKind,
    pub demo: bool,
}

async fn health_check(State(state): State<AppState>) -> ApiJson<HealthResponse> {
    ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.ledger.backend_kind(),
        demo: state.ledger.is_demo(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendResponse {
    pub backend: BackendKind,
    pub demo_mode: bool,
    pub configured: bool,
    pub privileged_key: bool,
}

async fn backend_info(State(state): State<AppState>) -> ApiJson<BackendResponse> {
    let config = &state.ledger.config;
    ok(BackendResponse {
        backend: state.ledger.backend_kind(),
        demo_mode: state.ledger.is_demo(),
        configured: config.validate().is_ok(),
        privileged_key: config.has_privileged_key(),
    })
}
