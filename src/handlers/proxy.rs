use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::error::GatewayResult;
use crate::metrics::UPSTREAM_LATENCY;
use crate::state::AppState;

// Headers that describe a single hop and must not be forwarded
const HOP_BY_HOP: [header::HeaderName; 6] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::TE,
    header::UPGRADE,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

// Forward an admitted request to the upstream and relay its response
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    mut headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<Response> {
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = format!("{}{}", state.upstream, path);
    strip_hop_by_hop(&mut headers);

    debug!(%method, %url, "forwarding");
    let start_time = Instant::now();

    let res = state
        .client
        .request(method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = res.status();
    let mut res_headers = res.headers().clone();
    strip_hop_by_hop(&mut res_headers);
    let bytes = res.bytes().await?;

    UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok((status, res_headers, bytes).into_response())
}
