//! API errors and the response envelope

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use storeledger_core::{Error, OperationResult};

/// Envelope for successful responses
pub type ApiJson<T> = Json<OperationResult<T>>;

pub type ApiResult<T> = Result<T, ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiJson<T> {
    Json(OperationResult::ok(data))
}

/// Attached to failed responses so the event log middleware can record them
#[derive(Debug, Clone)]
pub struct FailedRequest {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Backend(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), "{}", self.0);
        } else {
            tracing::debug!(kind = self.0.kind(), "{}", self.0);
        }

        let message = self.0.to_string();
        let body = Json(OperationResult::<()>::fail(message.clone()));
        let mut response = (status, body).into_response();
        response.extensions_mut().insert(FailedRequest {
            kind: self.0.kind(),
            message,
        });
        response
    }
}
