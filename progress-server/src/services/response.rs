//! HTTP response building helpers
//!
//! Every error body has the shape `{"error": message, "retryable": bool}` so a
//! client can tell "resend as is" from "fix the input".

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::ServerError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// Build an empty response with 204 No Content status
pub fn no_content() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

fn error_body(status: StatusCode, message: &str, retryable: bool) -> Response<Full<Bytes>> {
    json_response(
        status,
        &serde_json::json!({ "error": message, "retryable": retryable }),
    )
}

/// Build a 404 Not Found response with message
pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::NOT_FOUND, message, false)
}

/// Build a 400 Bad Request response with message
pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::BAD_REQUEST, message, false)
}

/// Build a 405 Method Not Allowed response
pub fn method_not_allowed() -> Response<Full<Bytes>> {
    error_body(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", false)
}

/// Convert a ServerError to an appropriate HTTP response
pub fn error_response(error: ServerError) -> Response<Full<Bytes>> {
    let retryable = error.is_retryable();
    let (status, message) = match &error {
        ServerError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        ServerError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        ServerError::Duplicate(msg) => (StatusCode::CONFLICT, msg.clone()),
        ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        ServerError::Json(e) => (StatusCode::BAD_REQUEST, format!("JSON error: {}", e)),
        ServerError::Timeout(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        ServerError::Database(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Storage unavailable: {}", e),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    };

    if status.is_server_error() {
        error!(status = %status, error = %error, "Request failed");
    }
    error_body(status, &message, retryable)
}

/// Wrap a service result into an HTTP response
pub fn from_result<T: Serialize>(result: Result<T, ServerError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap a create result into an HTTP response with 201 Created
pub fn from_create_result<T: Serialize>(result: Result<T, ServerError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => created(&value),
        Err(e) => error_response(e),
    }
}
