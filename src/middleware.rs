//! Per-client rate limiting middleware

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use crate::error::GatewayError;
use crate::metrics::{REQUEST_REJECTED, REQUEST_TOTAL};
use crate::rate_limit::Decision;
use crate::state::AppState;

pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Derive the limiter key for a request.
///
/// The peer IP without its port, or, when proxy headers are trusted, the
/// first `X-Forwarded-For` hop, then `X-Real-IP`.
pub fn client_key(peer: SocketAddr, headers: &HeaderMap, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded.or(real_ip) {
            return ip.to_string();
        }
    }
    peer.ip().to_string()
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };

    REQUEST_TOTAL.inc();
    let client = client_key(peer, request.headers(), state.trust_proxy_headers);

    match limiter.check(&client) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limiter.capacity()));
            headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
            response
        }
        Decision::Denied { retry_after } => {
            REQUEST_REJECTED.inc();
            warn!(
                client = %client,
                retry_after_ms = retry_after.as_millis() as u64,
                "rate limit exceeded"
            );
            GatewayError::RateLimited { client, retry_after }.into_response()
        }
    }
}
