//! Gateway error types

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorBody;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Errors surfaced by the HTTP layer.
///
/// The limiter itself never fails; a denial becomes [`GatewayError::RateLimited`]
/// only when it is rendered as a response.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limit exceeded for client {client}")]
    RateLimited { client: String, retry_after: Duration },

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("metrics output is not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

// Whole seconds, rounded up, never zero
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::RateLimited { retry_after, .. } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ErrorBody::new(RATE_LIMIT_MESSAGE)),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
                response
            }
            GatewayError::Upstream(e) => {
                error!("Upstream request failed: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorBody::new("Upstream unavailable")),
                )
                    .into_response()
            }
            other => {
                error!("Internal error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::new("Internal server error")),
                )
                    .into_response()
            }
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
