//! Relay worker configuration.

use std::time::Duration;

/// Tuning knobs for the outbox worker.
///
/// Reads from environment variables via [`OutboxConfig::from_env`]:
/// - `OUTBOX_BATCH_SIZE` — events fetched per iteration (default: `50`)
/// - `OUTBOX_MAX_RETRIES` — failed attempts before dead-lettering (default: `5`)
/// - `OUTBOX_POLL_INTERVAL_MS` — delay between iterations (default: `2000`)
/// - `OUTBOX_EXCHANGE` — primary exchange (default: `"hotel.events"`)
/// - `OUTBOX_DLX` — dead-letter exchange (default: `"hotel.events.dlx"`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxConfig {
    pub batch_size: usize,
    pub max_retries: i32,
    pub poll_interval: Duration,
    pub exchange: String,
    pub dead_letter_exchange: String,
}

impl OutboxConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 50;
    pub const DEFAULT_MAX_RETRIES: i32 = 5;
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            batch_size: lookup("OUTBOX_BATCH_SIZE")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.batch_size),
            max_retries: lookup("OUTBOX_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n >= 0)
                .unwrap_or(defaults.max_retries),
            poll_interval: lookup("OUTBOX_POLL_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            exchange: lookup("OUTBOX_EXCHANGE").unwrap_or(defaults.exchange),
            dead_letter_exchange: lookup("OUTBOX_DLX").unwrap_or(defaults.dead_letter_exchange),
        }
    }

    /// Overrides the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            exchange: "hotel.events".to_string(),
            dead_letter_exchange: "hotel.events.dlx".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_values() {
        let config = OutboxConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_ne!(config.exchange, config.dead_letter_exchange);
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("OUTBOX_BATCH_SIZE", "10"),
            ("OUTBOX_MAX_RETRIES", "3"),
            ("OUTBOX_POLL_INTERVAL_MS", "250"),
            ("OUTBOX_DLX", "dlx"),
        ]);
        let config = OutboxConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.exchange, "hotel.events");
        assert_eq!(config.dead_letter_exchange, "dlx");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = OutboxConfig::from_lookup(|k| match k {
            "OUTBOX_BATCH_SIZE" => Some("0".to_string()),
            "OUTBOX_POLL_INTERVAL_MS" => Some("soon".to_string()),
            _ => None,
        });
        assert_eq!(config, OutboxConfig::default());
    }
}
