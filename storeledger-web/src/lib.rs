//! StoreLedger Web - HTTP API over the core services
//!
//! Every response uses the `{"success", "data", "error"}` envelope. Sessions
//! live in `HttpOnly` cookies named after the active backend.

pub mod error;
mod routes;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use storeledger_core::services::{LogEvent, LoggingService};
use storeledger_core::LedgerContext;

use error::FailedRequest;
use session::{store_session, RefreshedSession};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerContext>,
    pub logging: Option<Arc<LoggingService>>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(ledger: LedgerContext, logging: Option<LoggingService>) -> Self {
        Self {
            secure_cookies: ledger.config.server.secure_cookies,
            ledger: Arc::new(ledger),
            logging: logging.map(Arc::new),
        }
    }

    /// Record an event in the local event log. Failures are only traced.
    pub async fn record(&self, event: LogEvent) {
        let Some(logging) = self.logging.clone() else {
            return;
        };
        let event = event.with_backend(self.ledger.backend_kind().as_str());
        let result = tokio::task::spawn_blocking(move || logging.log(event)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to write event log: {}", e),
            Err(e) => warn!("Event log task failed: {}", e),
        }
    }
}

/// Log failed requests by route, never by payload
async fn log_failures(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let response = next.run(request).await;

    if let Some(failed) = response.extensions().get::<FailedRequest>().cloned() {
        state
            .record(
                LogEvent::new("request_failed")
                    .with_route(route)
                    .with_error_kind(failed.kind)
                    .with_error_message(failed.message),
            )
            .await;
    }
    response
}

/// Write cookies for a session refreshed during the request, including
/// when the handler failed
async fn reissue_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let slot = RefreshedSession::default();
    request.extensions_mut().insert(slot.clone());
    let response = next.run(request).await;

    match slot.take() {
        Some(session) => {
            let jar = store_session(CookieJar::new(), &session, state.secure_cookies);
            (jar, response).into_response()
        }
        None => response,
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    routes::api_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), log_failures))
        .route_layer(middleware::from_fn_with_state(state.clone(), reissue_session))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve the API until Ctrl-C
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let backend = state.ledger.backend_kind();
    let demo = state.ledger.is_demo();
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, %backend, demo, "Starting StoreLedger API");
    state.record(LogEvent::new("server_started")).await;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Server stopped");
    Ok(())
}
