//! Bearer token authentication middleware

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

/// Paths reachable without a token: load balancer checks and the VAPID key
const PUBLIC_PATHS: &[&str] = &["/api/v1/health", "/api/v1/push/public-key"];

/// Reject requests whose `Authorization: Bearer` token differs from the
/// configured one
pub async fn auth_middleware(
    State(expected_token): State<String>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    if token.trim() != expected_token {
        debug!("rejected request to {} with invalid token", request.uri().path());
        return Err(AuthError::InvalidToken);
    }

    Ok(next.run(request).await)
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "missing Authorization header"),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "invalid Authorization format (expected: Bearer <token>)",
            ),
            AuthError::InvalidToken => (StatusCode::FORBIDDEN, "invalid token"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
