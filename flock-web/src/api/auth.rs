//! Request signing middleware
//!
//! Mutating requests must carry `x-flock-timestamp` and `x-flock-signature`
//! headers (see [`flock_common::auth`]). GET, HEAD and OPTIONS pass through
//! unchecked.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use flock_common::auth::{
    verify_request, AuthError as SigningError, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use flock_common::time::now_millis;
use serde_json::json;
use tracing::warn;

use crate::AppState;

/// Authentication middleware
///
/// Returns 401 Unauthorized for a bad signature or stale timestamp, 400 for
/// missing or malformed headers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if is_read_only(request.method()) {
        return Ok(next.run(request).await);
    }

    // Secret 0 disables all checking
    if state.shared_secret == 0 {
        return Ok(next.run(request).await);
    }

    let timestamp = timestamp_header(request.headers())?;
    let signature = header_str(request.headers(), SIGNATURE_HEADER)?.to_string();

    let method = request.method().as_str().to_string();
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    // Upload-sized limit; the signature covers the whole body
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, state.settings.max_upload_bytes)
        .await
        .map_err(|e| AuthError::ParseError(format!("Failed to read body: {}", e)))?;

    verify_request(
        &method,
        &path,
        timestamp,
        &body_bytes,
        &signature,
        state.shared_secret,
        now_millis(),
    )
    .map_err(|e| {
        warn!("Rejected {} {}: {}", method, path, e);
        AuthError::from(e)
    })?;

    // Reconstruct request with restored body for downstream handlers
    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}

fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    let value = headers.get(name).ok_or(AuthError::MissingHeader(name))?;
    value
        .to_str()
        .map_err(|_| AuthError::ParseError(format!("{} is not valid ASCII", name)))
}

fn timestamp_header(headers: &HeaderMap) -> Result<i64, AuthError> {
    let raw = header_str(headers, TIMESTAMP_HEADER)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AuthError::ParseError(format!("{} must be Unix milliseconds, got '{}'", TIMESTAMP_HEADER, raw)))
}

/// Authentication error types for HTTP responses
#[derive(Debug)]
pub enum AuthError {
    InvalidTimestamp(String),
    InvalidSignature,
    MissingHeader(&'static str),
    ParseError(String),
    Other(String),
}

impl From<SigningError> for AuthError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::InvalidTimestamp { reason, .. } => AuthError::InvalidTimestamp(reason),
            SigningError::InvalidSignature => AuthError::InvalidSignature,
            SigningError::MissingHeader(name) => AuthError::MissingHeader(name),
            SigningError::MalformedHeader(name, detail) => {
                AuthError::ParseError(format!("{}: {}", name, detail))
            }
            SigningError::Database(msg) => AuthError::Other(msg),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::InvalidTimestamp(reason) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TIMESTAMP",
                format!("Invalid timestamp: {}", reason),
            ),
            AuthError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "INVALID_SIGNATURE",
                "Invalid signature".to_string(),
            ),
            AuthError::MissingHeader(name) => (
                StatusCode::BAD_REQUEST,
                "MISSING_HEADER",
                format!("Missing required header: {}", name),
            ),
            AuthError::ParseError(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", format!("Parse error: {}", msg))
            }
            AuthError::Other(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                format!("Authentication error: {}", msg),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
