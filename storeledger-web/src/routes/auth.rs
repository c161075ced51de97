//! Sign-in, registration and session routes

use axum::extract::{Json, State};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use storeledger_core::domain::{AuthUser, Company, Credentials, Permission, Profile};
use storeledger_core::services::{LogEvent, OwnerRegistration, SignedIn};

use super::Body;
use crate::error::{ok, ApiJson, ApiResult};
use crate::session::{clear_session, read_session, store_session, Authenticated};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/join", post(join))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default, alias = "company_name")]
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(alias = "company_code")]
    pub company_code: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: AuthUser,
    pub profile: Profile,
    pub company: Company,
    pub permissions: Vec<Permission>,
}

async fn signed_in(
    state: &AppState,
    jar: CookieJar,
    signed_in: SignedIn,
    event: &str,
) -> (CookieJar, ApiJson<SignedIn>) {
    state.record(LogEvent::new(event)).await;
    let jar = store_session(jar, &signed_in.session, state.secure_cookies);
    (jar, ok(signed_in))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(credentials), _): Body<Credentials>,
) -> ApiResult<(CookieJar, ApiJson<SignedIn>)> {
    let result = state.ledger.auth_service.sign_in(credentials).await?;
    Ok(signed_in(&state, jar, result, "login").await)
}

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(request), _): Body<RegisterRequest>,
) -> ApiResult<(CookieJar, ApiJson<SignedIn>)> {
    let registration = OwnerRegistration {
        credentials: request.credentials,
        company_name: request.company_name,
    };
    let result = state.ledger.auth_service.register_owner(registration).await?;
    Ok(signed_in(&state, jar, result, "company_registered").await)
}

async fn join(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(request), _): Body<JoinRequest>,
) -> ApiResult<(CookieJar, ApiJson<SignedIn>)> {
    let result = state
        .ledger
        .auth_service
        .join_company(request.credentials, &request.company_code)
        .await?;
    Ok(signed_in(&state, jar, result, "company_joined").await)
}

/// Always clears the cookies, even when the backend call fails
async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiJson<()>) {
    let kind = state.ledger.backend_kind();
    if let Some(session) = read_session(kind, &jar) {
        if let Err(e) = state.ledger.auth_service.sign_out(&session).await {
            tracing::warn!("Backend sign-out failed: {}", e);
        }
        state.record(LogEvent::new("logout")).await;
    }
    (clear_session(jar, kind), ok(()))
}

async fn me(auth: Authenticated) -> ApiJson<MeResponse> {
    let ctx = auth.ctx;
    let permissions = ctx.role().permissions();
    let response = MeResponse {
        user: ctx.user,
        profile: ctx.profile,
        company: ctx.company,
        permissions,
    };
    ok(response)
}
