//! Collaborator seams: history fetch, live transport, and message send.
//!
//! Implementations live outside the core (HTTP and websocket clients in
//! production, scripted fakes in tests). The core holds them as trait
//! objects so one registry can drive any mix.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use kiu_shared::error::Result;
use kiu_shared::protocol::{HistorySnapshot, TransportEvent};
use kiu_shared::types::ChannelId;

/// Bulk history for one channel.
#[async_trait]
pub trait HistoryFetch: Send + Sync + 'static {
    async fn fetch_history(&self, channel: &ChannelId) -> Result<HistorySnapshot>;
}

/// Opens live push connections. The transport owns connect/reconnect and
/// backoff; it reports progress through [`TransportEvent`]s.
pub trait LiveTransport: Send + Sync + 'static {
    fn open(&self, channel: &ChannelId, buffer: usize) -> LiveConnection;
}

/// Fire-and-forget outbound write.
#[async_trait]
pub trait MessageSender: Send + Sync + 'static {
    async fn send_message(&self, channel: &ChannelId, body: &str) -> Result<()>;
}

/// Receiving half of one live connection.
///
/// Dropping or closing it releases the connection: transports watch their
/// sender for closure and shut down.
#[derive(Debug)]
pub struct LiveConnection {
    events: mpsc::Receiver<TransportEvent>,
}

impl LiveConnection {
    pub fn new(events: mpsc::Receiver<TransportEvent>) -> Self {
        Self { events }
    }

    /// Create a connected sender/connection pair.
    pub fn channel(buffer: usize) -> (mpsc::Sender<TransportEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self::new(rx))
    }

    /// Next event, or `None` once the transport has gone away.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    pub fn close(mut self) {
        self.events.close();
    }
}

/// The external collaborators a registry drives.
#[derive(Clone)]
pub struct Collaborators {
    pub history: Arc<dyn HistoryFetch>,
    pub transport: Arc<dyn LiveTransport>,
    pub sender: Arc<dyn MessageSender>,
}

impl Collaborators {
    pub fn new(
        history: Arc<dyn HistoryFetch>,
        transport: Arc<dyn LiveTransport>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            history,
            transport,
            sender,
        }
    }
}
