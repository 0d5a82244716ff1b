//! Client configuration loaded from environment variables.
//!
//! All settings have defaults pointing at the public BorderKiu service, so
//! the client starts with zero configuration.

use std::time::Duration;

use kiu_shared::types::ChannelId;
use kiu_sync::SyncConfig;

/// Border crossings known at build time. The live set normally comes from
/// the border data service.
pub const DEFAULT_CHANNELS: [&str; 5] = [
    "Miri(SungaiTujuh)",
    "KualaLurah(ICQSTedungan)",
    "UjungJalan(ICQSPandaruan)",
    "Lawas(ICQSMengkalap)",
    "Sindumin-Merapok",
];

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the chat history/send API.
    /// Env: `KIU_API_BASE`
    /// Default: `https://www.borderkiu.com`
    pub api_base: String,

    /// Base URL of the live feed; each channel connects to `<base>/<channel>`.
    /// Env: `KIU_SOCKET_BASE`
    /// Default: `wss://www.borderkiu.com`
    pub socket_base: String,

    /// Identifier sent with every connection and message.
    /// Env: `KIU_DEVICE_ID`
    /// Default: `borderkiu-mobile-app`
    pub device_id: String,

    /// Channels to subscribe to.
    /// Env: `KIU_CHANNELS` (comma separated)
    pub channels: Vec<ChannelId>,

    /// How often channel summaries are logged.
    /// Env: `KIU_SUMMARY_INTERVAL_SECS`
    /// Default: 15 s
    pub summary_interval: Duration,

    /// First live-feed reconnect delay; doubles up to `reconnect_max`.
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,

    /// Synchronization core settings.
    pub sync: SyncConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.borderkiu.com".to_string(),
            socket_base: "wss://www.borderkiu.com".to_string(),
            device_id: "borderkiu-mobile-app".to_string(),
            channels: DEFAULT_CHANNELS.iter().map(|c| ChannelId::from(*c)).collect(),
            summary_interval: Duration::from_secs(15),
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(10),
            sync: SyncConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self {
            sync: SyncConfig::from_env(),
            ..Self::default()
        };

        if let Ok(url) = std::env::var("KIU_API_BASE") {
            config.api_base = url;
        }

        if let Ok(url) = std::env::var("KIU_SOCKET_BASE") {
            config.socket_base = url;
        }

        if let Ok(id) = std::env::var("KIU_DEVICE_ID") {
            if !id.trim().is_empty() {
                config.device_id = id;
            }
        }

        if let Ok(list) = std::env::var("KIU_CHANNELS") {
            let channels = parse_channel_list(&list);
            if channels.is_empty() {
                tracing::warn!(value = %list, "Empty KIU_CHANNELS, using defaults");
            } else {
                config.channels = channels;
            }
        }

        if let Ok(val) = std::env::var("KIU_SUMMARY_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.summary_interval = Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %val, "Invalid KIU_SUMMARY_INTERVAL_SECS, using default")
                }
            }
        }

        config
    }
}

/// Split a comma separated channel list, dropping blanks and repeats.
pub fn parse_channel_list(list: &str) -> Vec<ChannelId> {
    let mut channels: Vec<ChannelId> = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = ChannelId::from(name);
        if !channels.contains(&id) {
            channels.push(id);
        }
    }
    channels
}
