use crate::interface_adapters::net::ReconnectPolicy;
use std::{env, time::Duration};

// Runtime settings read from the environment (after `.env` is loaded).

pub fn ws_url() -> String {
    env::var("BATTLE_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8000/ws".to_string())
}

pub fn api_url() -> String {
    env::var("BATTLE_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
}

/// Fixed delay unless `RECONNECT_MAX_DELAY_MS` caps an exponential backoff.
pub fn reconnect_policy() -> ReconnectPolicy {
    let base = millis_var("RECONNECT_DELAY_MS").unwrap_or(3000);
    match millis_var("RECONNECT_MAX_DELAY_MS") {
        Some(max) if max > base => ReconnectPolicy::Backoff {
            base: Duration::from_millis(base),
            max: Duration::from_millis(max),
        },
        _ => ReconnectPolicy::Fixed(Duration::from_millis(base)),
    }
}

pub fn connect_timeout() -> Duration {
    Duration::from_millis(millis_var("CONNECT_TIMEOUT_MS").unwrap_or(10_000))
}

pub fn rank_highlight_window() -> Duration {
    Duration::from_millis(millis_var("RANK_HIGHLIGHT_MS").unwrap_or(2000))
}

pub fn admin_timeout() -> Duration {
    Duration::from_millis(millis_var("ADMIN_TIMEOUT_MS").unwrap_or(5000))
}

fn millis_var(name: &str) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
}

pub const EVENT_CHANNEL_CAPACITY: usize = 256;
pub const DASHBOARD_EVENT_CAPACITY: usize = 64;
