//! Cookie-backed sessions

use std::sync::{Arc, Mutex};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use storeledger_core::domain::session::cookie_names;
use storeledger_core::domain::{BackendKind, Session};
use storeledger_core::services::UserContext;
use storeledger_core::Error;

use crate::error::ApiError;
use crate::AppState;

/// Session carried by the request cookies, if any
pub fn read_session(kind: BackendKind, jar: &CookieJar) -> Option<Session> {
    Session::from_cookies(kind, |name| jar.get(name).map(|c| c.value().to_string()))
}

/// Add the session cookies to the jar
pub fn store_session(jar: CookieJar, session: &Session, secure: bool) -> CookieJar {
    session.cookie_pairs().into_iter().fold(jar, |jar, (name, value)| {
        jar.add(
            Cookie::build((name, value))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(secure),
        )
    })
}

/// Expire every cookie the backend writes
pub fn clear_session(jar: CookieJar, kind: BackendKind) -> CookieJar {
    cookie_names(kind)
        .iter()
        .fold(jar, |jar, name| jar.remove(Cookie::build(*name).path("/")))
}

/// Holds a session the backend re-issued while a request was handled.
///
/// The session middleware puts an empty slot into the request extensions
/// and writes the cookies onto the response whatever its status.
#[derive(Clone, Default)]
pub struct RefreshedSession(Arc<Mutex<Option<Session>>>);

impl RefreshedSession {
    pub fn set(&self, session: Session) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(session);
        }
    }

    pub fn take(&self) -> Option<Session> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// A signed-in caller
pub struct Authenticated {
    pub ctx: UserContext,
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let kind = state.ledger.backend_kind();
        let session =
            read_session(kind, &jar).ok_or_else(|| Error::unauthorized("Please sign in"))?;

        let resolved = state.ledger.auth_service.resolve(session).await?;
        if resolved.refreshed {
            tracing::debug!(user_id = %resolved.context.user_id(), "Session refreshed");
            if let Some(slot) = parts.extensions.get::<RefreshedSession>() {
                slot.set(resolved.context.session.clone());
            }
        }

        Ok(Self {
            ctx: resolved.context,
        })
    }
}
