//! Session configuration from environment variables.

use std::time::Duration;

use crate::ws::BackoffPolicy;

pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";

/// Timings and endpoint for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// WebSocket endpoint; the auth token is appended as `?token=`.
    pub ws_url: String,
    pub heartbeat_interval: Duration,
    /// How long an exit confirmation stays answerable.
    pub confirmation_timeout: Duration,
    pub reconnect: BackoffPolicy,
    /// Pause between tearing down and reopening on a manual reconnect.
    pub reconnect_settle: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval: Duration::from_millis(30000),
            confirmation_timeout: Duration::from_millis(20000),
            reconnect: BackoffPolicy::default(),
            reconnect_settle: Duration::from_millis(100),
        }
    }
}

impl SessionConfig {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SURVEILX_WS_URL` (default: "ws://localhost:8080/ws")
    /// - `SURVEILX_HEARTBEAT_MS` (default: 30000)
    /// - `SURVEILX_CONFIRMATION_TIMEOUT_MS` (default: 20000)
    /// - `SURVEILX_RECONNECT_BASE_MS` (default: 1000)
    /// - `SURVEILX_RECONNECT_CAP_MS` (default: 30000)
    /// - `SURVEILX_RECONNECT_MAX_ATTEMPTS` (default: 10)
    /// - `SURVEILX_RECONNECT_SETTLE_MS` (default: 100)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            Duration::from_millis(parse_or(key, lookup(key), default.as_millis() as u64))
        };
        // Zero would make the timer fire back to back
        let nonzero_millis = |key: &str, default: Duration| {
            let value = millis(key, default);
            if value.is_zero() {
                tracing::warn!(key, "setting must be greater than zero, using default");
                return default;
            }
            value
        };

        let ws_url = lookup("SURVEILX_WS_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.ws_url);

        Self {
            ws_url,
            heartbeat_interval: nonzero_millis(
                "SURVEILX_HEARTBEAT_MS",
                defaults.heartbeat_interval,
            ),
            confirmation_timeout: nonzero_millis(
                "SURVEILX_CONFIRMATION_TIMEOUT_MS",
                defaults.confirmation_timeout,
            ),
            reconnect: BackoffPolicy {
                max_attempts: parse_or(
                    "SURVEILX_RECONNECT_MAX_ATTEMPTS",
                    lookup("SURVEILX_RECONNECT_MAX_ATTEMPTS"),
                    defaults.reconnect.max_attempts,
                ),
                initial_delay: nonzero_millis(
                    "SURVEILX_RECONNECT_BASE_MS",
                    defaults.reconnect.initial_delay,
                ),
                max_delay: nonzero_millis(
                    "SURVEILX_RECONNECT_CAP_MS",
                    defaults.reconnect.max_delay,
                ),
            },
            reconnect_settle: millis("SURVEILX_RECONNECT_SETTLE_MS", defaults.reconnect_settle),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting, using default");
            default
        }
    }
}
