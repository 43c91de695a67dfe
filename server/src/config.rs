//! Relay configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_ENV: &str = "development";
pub const DEFAULT_WS_RATE_BURST: u32 = 10;
pub const DEFAULT_WS_RATE_REFILL_MS: u64 = 100;
pub const DEFAULT_WS_CLIENT_BUFFER: usize = 256;
/// Upper bound for `WS_RATE_REFILL_MS`.
pub const MAX_WS_RATE_REFILL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Deployment label reported by the healthcheck.
    pub env: String,
    pub ws: WsLimits,
    /// Shared secret for the publish route. `None` disables publishing.
    pub publish_token: Option<String>,
}

/// Per-connection websocket limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsLimits {
    /// Inbound frames accepted back to back before throttling.
    pub rate_burst: u32,
    /// Time to earn one more inbound frame.
    pub rate_refill: Duration,
    /// Outbound events queued per client before new ones are skipped.
    pub client_buffer: usize,
}

impl ServerConfig {
    /// Build config from environment variables (call after `dotenvy`).
    ///
    /// Optional:
    /// - `PORT`: default 4000
    /// - `APP_ENV`: default `development`
    /// - `WS_RATE_BURST`: default 10
    /// - `WS_RATE_REFILL_MS`: default 100, at most 60000
    /// - `WS_CLIENT_BUFFER`: default 256
    /// - `PUBLISH_TOKEN`: unset or empty rejects every publish
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: env_parse(&lookup, "PORT", DEFAULT_PORT),
            env: lookup("APP_ENV").unwrap_or_else(|| DEFAULT_ENV.to_owned()),
            ws: WsLimits {
                rate_burst: env_parse(&lookup, "WS_RATE_BURST", DEFAULT_WS_RATE_BURST).max(1),
                rate_refill: Duration::from_millis(env_parse(&lookup, "WS_RATE_REFILL_MS", DEFAULT_WS_RATE_REFILL_MS))
                    .min(MAX_WS_RATE_REFILL),
                client_buffer: env_parse(&lookup, "WS_CLIENT_BUFFER", DEFAULT_WS_CLIENT_BUFFER).max(1),
            },
            publish_token: lookup("PUBLISH_TOKEN")
                .map(|token| token.trim().to_owned())
                .filter(|token| !token.is_empty()),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
