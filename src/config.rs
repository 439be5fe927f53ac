use clap::Parser;

use crate::rate_limit::effective_capacity;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "rate-gateway")]
#[command(about = "Per-client sliding-window rate limiter in front of an HTTP upstream")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Upstream that admitted requests are forwarded to
    // Example: "localhost:3000" or "http://10.0.0.5:9000"
    #[arg(short, long, default_value = "localhost:3000")]
    pub upstream: String,

    // Max requests per client per minute (0 means the default of 100)
    #[arg(short, long, default_value_t = 100)]
    pub requests_per_minute: u32,

    // Take the client address from X-Forwarded-For / X-Real-IP
    #[arg(long)]
    pub trust_proxy_headers: bool,

    // Forward every request without rate limiting
    #[arg(long)]
    pub no_rate_limit: bool,
}

impl Args {
    pub fn capacity(&self) -> u32 {
        effective_capacity(self.requests_per_minute)
    }

    pub fn upstream_url(&self) -> String {
        normalize_upstream(&self.upstream)
    }
}

// add http:// if not present, drop trailing slash
pub fn normalize_upstream(upstream: &str) -> String {
    let upstream = upstream.trim().trim_end_matches('/');
    if upstream.starts_with("http://") || upstream.starts_with("https://") {
        upstream.to_string()
    } else {
        format!("http://{}", upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["rate-gateway"]);
        assert_eq!(args.port, 8080);
        assert_eq!(args.capacity(), 100);
        assert_eq!(args.upstream_url(), "http://localhost:3000");
        assert!(!args.trust_proxy_headers);
        assert!(!args.no_rate_limit);
    }

    #[test]
    fn zero_requests_per_minute_uses_default() {
        let args = Args::parse_from(["rate-gateway", "-r", "0"]);
        assert_eq!(args.capacity(), 100);

        let args = Args::parse_from(["rate-gateway", "--requests-per-minute", "7"]);
        assert_eq!(args.capacity(), 7);
    }

    #[test]
    fn upstream_is_normalized() {
        assert_eq!(normalize_upstream("localhost:9000/"), "http://localhost:9000");
        assert_eq!(normalize_upstream(" https://api.example.com "), "https://api.example.com");
    }
}
