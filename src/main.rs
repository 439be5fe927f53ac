use clap::Parser;
use rate_gateway::config::Args;
use rate_gateway::error::GatewayError;
use rate_gateway::state::AppState;
use rate_gateway::{RateLimiter, app};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rate_gateway=info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();
    let upstream = args.upstream_url();

    let (rate_limiter, reclaimer) = if args.no_rate_limit {
        warn!("Rate limiting is DISABLED, every request is forwarded");
        (None, None)
    } else {
        let (limiter, reclaimer) = RateLimiter::start(args.requests_per_minute);
        (Some(limiter), Some(reclaimer))
    };

    let state = Arc::new(AppState {
        client: reqwest::Client::new(),
        upstream: upstream.clone(),
        rate_limiter,
        trust_proxy_headers: args.trust_proxy_headers,
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Gateway running on http://localhost:{}", args.port);
    info!("Forwarding to upstream at {}", upstream);
    if !args.no_rate_limit {
        info!(
            "Rate limit: {} requests per minute per client (proxy headers trusted: {})",
            args.capacity(),
            args.trust_proxy_headers
        );
    }

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(reclaimer) = reclaimer {
        reclaimer.shutdown().await;
    }
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
