use thiserror::Error;

use crate::types::ChannelId;

/// Errors produced by the chat core. None of them is fatal to the process
/// and none crosses from one channel to another.
#[derive(Error, Debug)]
pub enum KiuError {
    /// A single record could not be normalized. Dropped and counted.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Channel-level; shown as an error state with a retry affordance.
    #[error("History fetch failed: {0}")]
    HistoryFetchFailed(String),

    #[error("Transport connect failed: {0}")]
    TransportConnectFailed(String),

    #[error("Transport disconnected: {0}")]
    TransportDisconnected(String),

    /// Caller-level; surfaced to the composer, never touches the timeline.
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Message body is empty")]
    EmptyMessage,

    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    #[error("Subscription registry has been stopped")]
    RegistryStopped,

    #[error("Channel subscription is closed")]
    SubscriptionClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, KiuError>;
