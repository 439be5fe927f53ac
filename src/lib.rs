//! Rate-limiting HTTP gateway.
//!
//! Each client address gets a sliding one-minute window of admitted request
//! timestamps ([`rate_limit::RateLimiter`]). Requests over the quota are
//! rejected with `429 Too Many Requests`; the rest are forwarded to the
//! configured upstream. A background [`reclaimer::Reclaimer`] sweeps idle
//! clients out of memory every five minutes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod reclaimer;
pub mod state;
pub mod store;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::handlers::{health_handler, metrics_handler, proxy_handler};
use crate::middleware::rate_limit_middleware;
use crate::state::AppState;

pub use crate::rate_limit::{Decision, RateLimiter};
pub use crate::reclaimer::Reclaimer;

/// Build the gateway router.
///
/// `/health` and `/metrics` are served directly; everything else passes the
/// rate limiter and is proxied upstream. The service must be run with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the peer address
/// is available.
pub fn app(state: Arc<AppState>) -> Router {
    let proxied = Router::new()
        .fallback(proxy_handler)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback_service(proxied)
}
