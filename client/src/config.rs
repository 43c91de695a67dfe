//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ClientError;
use crate::reconnect::ReconnectPolicy;

pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:4000";
pub const WS_PATH: &str = "/api/v1/ws";
pub const DEFAULT_RECONNECT_INITIAL_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Application origin, e.g. `https://globechat.live`.
    pub origin: String,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Config for `origin` with default reconnect settings.
    #[must_use]
    pub fn with_origin(origin: impl Into<String>) -> Self {
        Self { origin: origin.into(), reconnect: ReconnectPolicy::default() }
    }

    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `GLOBECHAT_ORIGIN`: default `http://127.0.0.1:4000`
    /// - `GLOBECHAT_RECONNECT_INITIAL_MS`: default 1000
    /// - `GLOBECHAT_RECONNECT_MAX_MS`: default 10000
    /// - `GLOBECHAT_RECONNECT_MAX_ATTEMPTS`: default unlimited, `0` also means unlimited
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let origin = lookup("GLOBECHAT_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_owned());
        let initial = parse_or(&lookup, "GLOBECHAT_RECONNECT_INITIAL_MS", DEFAULT_RECONNECT_INITIAL_MS);
        let max = parse_or(&lookup, "GLOBECHAT_RECONNECT_MAX_MS", DEFAULT_RECONNECT_MAX_MS);
        let max_attempts = parse_or(&lookup, "GLOBECHAT_RECONNECT_MAX_ATTEMPTS", 0_u32);

        Self {
            origin,
            reconnect: ReconnectPolicy {
                initial: Duration::from_millis(initial),
                max: Duration::from_millis(max.max(initial)),
                max_attempts: (max_attempts > 0).then_some(max_attempts),
            },
        }
    }

    /// Websocket endpoint derived from the origin.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidOrigin`] if the origin is not http(s).
    pub fn ws_url(&self) -> Result<String, ClientError> {
        ws_url(&self.origin)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_origin(DEFAULT_ORIGIN)
    }
}

/// Translate an http(s) origin into the realtime endpoint URL.
///
/// # Errors
///
/// Returns [`ClientError::InvalidOrigin`] for any scheme other than
/// `http://` or `https://`.
pub fn ws_url(origin: &str) -> Result<String, ClientError> {
    let origin = origin.trim_end_matches('/');
    if let Some(rest) = origin.strip_prefix("https://") {
        return Ok(format!("wss://{rest}{WS_PATH}"));
    }
    if let Some(rest) = origin.strip_prefix("http://") {
        return Ok(format!("ws://{rest}{WS_PATH}"));
    }

    Err(ClientError::InvalidOrigin(origin.to_owned()))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
