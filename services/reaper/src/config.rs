//! Configuration for the reaper daemon.

use std::time::Duration;

use anyhow::Result;
use warden_fleet::FleetTags;

/// Reaper configuration, loaded from `WARDEN_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds between reclamation cycles.
    pub check_interval: Duration,

    /// Maximum allowed lifetime since last observed active, in seconds.
    pub max_life_span_secs: u64,

    /// How many expired instances may be stopped (kept recoverable)
    /// instead of terminated, over the process lifetime.
    pub max_stopped: u32,

    /// Versioned image naming pattern used by `launch`.
    pub image_pattern: String,

    /// Instance type/class for new instances.
    pub instance_type: String,

    /// Management marker and idle-marker tag scheme.
    pub tags: FleetTags,

    /// Liveness command dispatched through the remote probe. Must exit
    /// successfully and print the number of active workload processes.
    pub probe_command: String,

    /// Wall-clock budget for a single probe result.
    pub probe_wait: Duration,

    /// Provider backend selector (`memory` is the only bundled backend).
    pub provider: String,

    /// Log level fallback when `RUST_LOG` is unset.
    pub log_level: String,

    /// Dev mode: seed the in-memory fleet with images.
    pub dev_mode: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let check_interval_secs = std::env::var("WARDEN_CHECK_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20);

        let max_life_span_secs = std::env::var("WARDEN_MAX_LIFE_SPAN")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(240);

        let max_stopped = std::env::var("WARDEN_MAX_STOPPED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let image_pattern = std::env::var("WARDEN_IMAGE_PATTERN")
            .unwrap_or_else(|_| r"fleet-server-v\d+".to_string());

        let instance_type =
            std::env::var("WARDEN_INSTANCE_TYPE").unwrap_or_else(|_| "standard-xlarge".to_string());

        let defaults = FleetTags::default();
        let tags = FleetTags {
            managed_key: std::env::var("WARDEN_MANAGED_TAG_KEY")
                .unwrap_or(defaults.managed_key),
            managed_value: std::env::var("WARDEN_MANAGED_TAG_VALUE")
                .unwrap_or(defaults.managed_value),
            idle_key: std::env::var("WARDEN_IDLE_TAG_KEY").unwrap_or(defaults.idle_key),
        };

        let probe_command = std::env::var("WARDEN_PROBE_COMMAND")
            .unwrap_or_else(|_| "pgrep -cf fleet-worker || true".to_string());

        let probe_wait_secs = std::env::var("WARDEN_PROBE_WAIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let provider = std::env::var("WARDEN_PROVIDER").unwrap_or_else(|_| "memory".to_string());

        let log_level = std::env::var("WARDEN_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("WARDEN_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            check_interval: Duration::from_secs(check_interval_secs),
            max_life_span_secs,
            max_stopped,
            image_pattern,
            instance_type,
            tags,
            probe_command,
            probe_wait: Duration::from_secs(probe_wait_secs),
            provider,
            log_level,
            dev_mode,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(20),
            max_life_span_secs: 240,
            max_stopped: 0,
            image_pattern: r"fleet-server-v\d+".to_string(),
            instance_type: "standard-xlarge".to_string(),
            tags: FleetTags::default(),
            probe_command: "pgrep -cf fleet-worker || true".to_string(),
            probe_wait: Duration::from_secs(10),
            provider: "memory".to_string(),
            log_level: "info".to_string(),
            dev_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.check_interval.as_secs(), 20);
        assert_eq!(config.max_life_span_secs, 240);
        assert_eq!(config.max_stopped, 0);
        assert_eq!(config.tags.idle_key, "last-active-at");
    }
}
