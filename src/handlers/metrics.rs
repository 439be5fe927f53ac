use prometheus::{Encoder, TextEncoder};

use crate::error::GatewayResult;

pub async fn metrics_handler() -> GatewayResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
