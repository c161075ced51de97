//! HTTP plumbing shared by the REST backends

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};

/// Rows requested per page from list endpoints
pub const PAGE_SIZE: usize = 1000;

const TIMEOUT_SECS: u64 = 120;

/// Longest slice of a non-JSON error body quoted in an error message
const RAW_MESSAGE_CHARS: usize = 200;

pub fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECS))
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Map request errors to user-friendly messages
pub fn map_request_error(backend: &str, error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::backend(format!("{} request timed out after {} seconds", backend, TIMEOUT_SECS))
    } else if error.is_connect() {
        Error::backend(format!("Unable to connect to {} servers", backend))
    } else if error.is_decode() {
        Error::backend(format!("Unexpected {} response: {}", backend, error))
    } else {
        Error::backend(format!("{} request failed: {}", backend, error))
    }
}

/// Pull the human-readable message out of an error body
pub fn error_message(body: &JsonValue) -> Option<String> {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

/// Map an HTTP status plus message onto the domain error
pub fn status_error(backend: &str, status: StatusCode, message: Option<String>) -> Error {
    let code = status.as_u16();
    let message = message.unwrap_or_else(|| format!("{} returned HTTP {}", backend, code));
    match code {
        400 | 422 => Error::Validation(message),
        401 => Error::Unauthorized(message),
        403 => Error::Forbidden(message),
        404 => Error::NotFound(message),
        409 => Error::Conflict(message),
        429 => Error::backend(format!("{} rate limit exceeded, try again shortly", backend)),
        _ => Error::backend(format!("{} API error: HTTP {}: {}", backend, code, message)),
    }
}

/// Read a successful response body as JSON, mapping failures by status.
/// Empty bodies become `null`.
pub async fn read_json(backend: &str, response: Response) -> Result<JsonValue> {
    read_json_with(backend, response, |status, _, message| {
        status_error(backend, status, message)
    })
    .await
}

/// Like [`read_json`], with a custom mapping for failed responses.
///
/// The status is checked before the body is parsed. `on_error` receives the
/// body as JSON (`null` when it was not JSON) and the best message found:
/// the JSON error text, otherwise the start of the raw body.
pub async fn read_json_with<F>(backend: &str, response: Response, on_error: F) -> Result<JsonValue>
where
    F: FnOnce(StatusCode, &JsonValue, Option<String>) -> Error,
{
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| map_request_error(backend, e))?;

    if !status.is_success() {
        let body: JsonValue = serde_json::from_str(&text).unwrap_or(JsonValue::Null);
        let message = error_message(&body).or_else(|| raw_message(&text));
        return Err(on_error(status, &body, message));
    }

    if text.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| Error::backend(format!("Failed to parse {} response: {}", backend, e)))
}

fn raw_message(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(RAW_MESSAGE_CHARS).collect())
    }
}
