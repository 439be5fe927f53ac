use std::sync::Arc;
use crate::rate_limit::RateLimiter;

// app's shared state

pub struct AppState {
    pub client: reqwest::Client,
    pub upstream: String,                    // base url admitted requests go to
    pub rate_limiter: Option<Arc<RateLimiter>>, // None when rate limiting is disabled
    pub trust_proxy_headers: bool,
}
