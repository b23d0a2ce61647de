//! Runtime configuration.
//!
//! DESIGN
//! ======
//! Every knob has a typed default and an environment override. Parsing goes
//! through a lookup function so tests can feed a map instead of mutating the
//! process environment. Unparseable values fall back to the default.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::str::FromStr;

use canvas::consts::DRAG_THROTTLE_MS;

const DEFAULT_CURSOR_EVICTION_MS: u64 = 5000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;
const DEFAULT_CURSOR_THROTTLE_MS: u64 = 0;
const DEFAULT_INBOUND_CAPACITY: usize = 256;
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RELAY_CHANNEL_CAPACITY: usize = 256;

/// Parse `key` from the process environment, or return `default`.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    lookup_parse(&|k| std::env::var(k).ok(), key, default)
}

fn lookup_parse<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

// =============================================================================
// SYNC
// =============================================================================

/// Timing and buffering for one board session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote cursors silent for longer than this are evicted.
    pub cursor_eviction_ms: u64,
    /// Period of the eviction sweep.
    pub sweep_interval_ms: u64,
    /// Minimum gap between two drag broadcasts.
    pub drag_throttle_ms: u64,
    /// Minimum gap between two cursor broadcasts; 0 sends every move.
    pub cursor_throttle_ms: u64,
    /// Per-subscription inbound queue depth.
    pub inbound_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cursor_eviction_ms: DEFAULT_CURSOR_EVICTION_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            drag_throttle_ms: DRAG_THROTTLE_MS,
            cursor_throttle_ms: DEFAULT_CURSOR_THROTTLE_MS,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            cursor_eviction_ms: lookup_parse(&lookup, "SYNC_CURSOR_EVICTION_MS", d.cursor_eviction_ms),
            sweep_interval_ms: lookup_parse(&lookup, "SYNC_SWEEP_INTERVAL_MS", d.sweep_interval_ms).max(1),
            drag_throttle_ms: lookup_parse(&lookup, "SYNC_DRAG_THROTTLE_MS", d.drag_throttle_ms),
            cursor_throttle_ms: lookup_parse(&lookup, "SYNC_CURSOR_THROTTLE_MS", d.cursor_throttle_ms),
            inbound_capacity: lookup_parse(&lookup, "SYNC_INBOUND_CAPACITY", d.inbound_capacity).max(1),
        }
    }
}

// =============================================================================
// RELAY
// =============================================================================

/// Settings for the websocket relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
    /// Outbound queue depth per connected socket.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, channel_capacity: DEFAULT_RELAY_CHANNEL_CAPACITY }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            port: lookup_parse(&lookup, "PORT", d.port),
            channel_capacity: lookup_parse(&lookup, "RELAY_CHANNEL_CAPACITY", d.channel_capacity).max(1),
        }
    }
}
