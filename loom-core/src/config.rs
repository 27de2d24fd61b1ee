//! Operational constants governing batching, retry, eviction, and bus
//! buffering, loaded with serde defaults overridable by environment
//! variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration governing batching, retry, eviction, and bus buffering.
/// No semantics depend on specific values beyond `max_attempts >= 1` and
/// `max_batch_size >= 1` (spec §6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoomConfig {
    /// Action coalescing ceiling: the most actions a single generator
    /// invocation will be given at once.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// How long a session's Processor may sit untouched before the
    /// Registry sweeper evicts it.
    #[serde(default = "default_idle_ttl", with = "duration_millis")]
    pub idle_ttl: Duration,

    /// How often the Registry sweeper scans for idle processors.
    #[serde(default = "default_sweep_interval", with = "duration_millis")]
    pub sweep_interval: Duration,

    /// Maximum Retry Stream attempts before surfacing `MaxAttemptsExceeded`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-subscriber buffer capacity on the Event Bus.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for LoomConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            idle_ttl: default_idle_ttl(),
            sweep_interval: default_sweep_interval(),
            max_attempts: default_max_attempts(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

fn default_max_batch_size() -> usize {
    if let Ok(v) = std::env::var("LOOM_MAX_BATCH_SIZE")
        && let Ok(v) = v.parse()
    {
        return v;
    }
    32
}

fn default_idle_ttl() -> Duration {
    if let Ok(v) = std::env::var("LOOM_IDLE_TTL_SECS")
        && let Ok(v) = v.parse()
    {
        return Duration::from_secs(v);
    }
    Duration::from_secs(15 * 60)
}

fn default_sweep_interval() -> Duration {
    if let Ok(v) = std::env::var("LOOM_SWEEP_INTERVAL_SECS")
        && let Ok(v) = v.parse()
    {
        return Duration::from_secs(v);
    }
    Duration::from_secs(60)
}

fn default_max_attempts() -> u32 {
    if let Ok(v) = std::env::var("LOOM_MAX_ATTEMPTS")
        && let Ok(v) = v.parse()
    {
        return v;
    }
    3
}

fn default_subscriber_buffer() -> usize {
    if let Ok(v) = std::env::var("LOOM_SUBSCRIBER_BUFFER")
        && let Ok(v) = v.parse()
    {
        return v;
    }
    256
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
