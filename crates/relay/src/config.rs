//! Relay configuration loaded from environment variables.

use std::net::SocketAddr;

use outbox::OutboxConfig;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Relay configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `METRICS_ADDR` — Prometheus scrape listener (default: `"0.0.0.0:9000"`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `json` for JSON lines, anything else for pretty output
/// - `GATEWAY_SEED` — seed of the simulated gateway (default: `42`)
/// - `PAYMENT_CURRENCY` — currency of new payments (default: `"USD"`)
/// - `RELAY_DEMO_CHECKOUT` — seed one booking and check it out on start
/// - the `OUTBOX_*` variables read by [`OutboxConfig`]
#[derive(Debug, Clone)]
pub struct Config {
    pub metrics_addr: SocketAddr,
    pub log_level: String,
    pub log_format: LogFormat,
    pub gateway_seed: u64,
    pub currency: String,
    pub demo_checkout: bool,
    pub outbox: OutboxConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            metrics_addr: lookup("METRICS_ADDR")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metrics_addr),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            gateway_seed: lookup("GATEWAY_SEED")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.gateway_seed),
            currency: lookup("PAYMENT_CURRENCY")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.currency),
            demo_checkout: lookup("RELAY_DEMO_CHECKOUT")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            outbox: OutboxConfig::from_lookup(&lookup),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            gateway_seed: 42,
            currency: saga::orchestrator::DEFAULT_CURRENCY.to_string(),
            demo_checkout: false,
            outbox: OutboxConfig::default(),
        }
    }
}
