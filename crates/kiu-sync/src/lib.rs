// Multi-channel chat synchronization core: per-channel timelines that merge
// bulk history with live pushes, unread/preview bookkeeping, and supervised
// live subscriptions.

pub mod channel;
pub mod config;
pub mod digest;
pub mod registry;
pub mod subscription;
pub mod timeline;
pub mod transport;
pub mod unread;

#[cfg(test)]
mod testing;

pub use channel::{ChannelDisplay, ChannelState, ChannelView};
pub use config::SyncConfig;
pub use digest::{digest, PreviewDigest};
pub use registry::{RefreshOutcome, SubscriptionRegistry};
pub use subscription::{ChannelCommand, ChannelSubscription};
pub use timeline::{ChannelTimeline, HistoryLoad, LiveAppend};
pub use transport::{Collaborators, HistoryFetch, LiveConnection, LiveTransport, MessageSender};
pub use unread::UnreadTracker;
