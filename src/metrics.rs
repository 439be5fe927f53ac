use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter = register_counter!(
        "rate_gateway_requests_total",
        "Total number of rate-limited requests seen"
    )
    .expect("register rate_gateway_requests_total");
    pub static ref REQUEST_REJECTED: Counter =
        register_counter!("rate_gateway_requests_rejected_total", "Requests rejected with 429")
            .expect("register rate_gateway_requests_rejected_total");
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!("rate_gateway_tracked_clients", "Client keys holding a request window")
            .expect("register rate_gateway_tracked_clients");
    pub static ref RECLAIMED_CLIENTS: Counter = register_counter!(
        "rate_gateway_reclaimed_clients_total",
        "Idle client keys removed by the reclaimer"
    )
    .expect("register rate_gateway_reclaimed_clients_total");
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "rate_gateway_upstream_latency_seconds",
        "Upstream round-trip latency in seconds"
    )
    .expect("register rate_gateway_upstream_latency_seconds");
}
