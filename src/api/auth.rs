//! Bearer token gate for the scrape API.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::error::AppError;

/// Rejects the request with 401 unless `Authorization: Bearer <token>`
/// matches the configured secret exactly. The scheme name is matched
/// case-insensitively. Runs before the body is read.
pub async fn require_bearer(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .is_some_and(|token| token == state.config.api_key);

    if !authorized {
        tracing::warn!(path = %req.uri().path(), "Rejected request with invalid or missing token");
        return AppError::Unauthorized.into_response();
    }

    next.run(req).await
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}
