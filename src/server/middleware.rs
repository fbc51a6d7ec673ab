//! Authentication and rate-limit middleware.

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::net::SocketAddr;

use super::{AppState, ErrorBody};

/// Paths reachable without an API key.
pub const PUBLIC_PATHS: &[&str] = &["/", "/health", "/docs", "/redoc", "/openapi.json"];

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Assigns a request id when the client did not send one and echoes it on
/// the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        let mut response = next.run(req).await;
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
        return response;
    }
    next.run(req).await
}

fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

/// API-key extraction: configured header first, `api_key` cookie fallback.
pub fn api_key_from_request(req: &Request<Body>, header_name: &str) -> Option<String> {
    if let Some(value) = req.headers().get(header_name) {
        if let Ok(key) = value.to_str() {
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }
    }
    let cookies = req.headers().get(axum::http::header::COOKIE)?;
    let cookies = cookies.to_str().ok()?;
    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some("api_key") {
            let value = parts.next().unwrap_or("");
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// 401 when no key is presented, 403 when the key is unknown. Skipped for
/// public paths and when auth is disabled or no keys are configured.
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if is_public(req.uri().path()) || !state.auth_enforced() {
        return next.run(req).await;
    }

    let Some(key) = api_key_from_request(&req, &state.api_key_header) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("API key required")),
        )
            .into_response();
    };

    if !state.api_keys.contains(&key) {
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorBody::new("invalid API key")),
        )
            .into_response();
    }

    next.run(req).await
}

/// Sliding-window rate limiting keyed by API key, else remote address.
/// Exceeding the window yields 429 with `Retry-After: 60`.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if is_public(req.uri().path()) {
        return next.run(req).await;
    }

    let key = api_key_from_request(&req, &state.api_key_header).unwrap_or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    });

    let limit = state.rate_limiter.limit();
    let (remaining, allowed) = state.rate_limiter.allow(&key);

    let mut response = if allowed {
        next.run(req).await
    } else {
        let mut rejected = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new("rate limit exceeded")),
        )
            .into_response();
        rejected
            .headers_mut()
            .insert("Retry-After", HeaderValue::from_static("60"));
        rejected
    };

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }

    response
}
