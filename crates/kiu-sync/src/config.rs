//! Synchronization settings loaded from environment variables.

use std::time::Duration;

use kiu_shared::constants::{DEFAULT_EVENT_BUFFER, SEND_REFRESH_DELAY_MS};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Force a history fetch whenever the live feed reconnects after a drop,
    /// closing the gap left by messages pushed while disconnected.
    /// Env: `KIU_REFRESH_ON_RECONNECT` (true/false)
    /// Default: `false`
    pub refresh_on_reconnect: bool,

    /// Delay between a confirmed send and the follow-up history refresh.
    /// Env: `KIU_SEND_REFRESH_MS`
    /// Default: 500 ms
    pub send_refresh_delay: Duration,

    /// Capacity of each channel's live event queue.
    /// Env: `KIU_EVENT_BUFFER`
    /// Default: `256`
    pub event_buffer: usize,

    /// Capacity of each channel's command queue.
    pub command_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_on_reconnect: false,
            send_refresh_delay: Duration::from_millis(SEND_REFRESH_DELAY_MS),
            event_buffer: DEFAULT_EVENT_BUFFER,
            command_buffer: 32,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("KIU_REFRESH_ON_RECONNECT") {
            config.refresh_on_reconnect = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("KIU_SEND_REFRESH_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.send_refresh_delay = Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid KIU_SEND_REFRESH_MS, using default")
                }
            }
        }

        if let Ok(val) = std::env::var("KIU_EVENT_BUFFER") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.event_buffer = n,
                _ => tracing::warn!(value = %val, "Invalid KIU_EVENT_BUFFER, using default"),
            }
        }

        config
    }
}

/// `false`, `0`, `no` and `off` are false; anything else is true.
pub fn parse_flag(val: &str) -> bool {
    !matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.refresh_on_reconnect);
        assert_eq!(config.send_refresh_delay, Duration::from_millis(500));
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" Off "));
    }
}
