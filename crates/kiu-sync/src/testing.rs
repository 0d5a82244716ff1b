//! Scripted collaborators for driving subscriptions deterministically.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};

use kiu_shared::error::{KiuError, Result};
use kiu_shared::protocol::{HistorySnapshot, TransportEvent};
use kiu_shared::types::ChannelId;

use crate::channel::ChannelView;
use crate::transport::{Collaborators, HistoryFetch, LiveConnection, LiveTransport, MessageSender};

pub enum Scripted {
    Ready(Result<HistorySnapshot>),
    /// Resolves when the test sends on the paired sender.
    Gated(oneshot::Receiver<Result<HistorySnapshot>>),
    /// Never resolves.
    Pending,
}

/// History responses queued per channel; unscripted fetches return an empty
/// snapshot.
#[derive(Default)]
pub struct ScriptedHistory {
    scripts: Mutex<HashMap<ChannelId, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<ChannelId, usize>>,
}

impl ScriptedHistory {
    pub fn script(&self, channel: &ChannelId, response: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(channel.clone())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self, channel: &ChannelId) -> usize {
        self.calls.lock().unwrap().get(channel).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HistoryFetch for ScriptedHistory {
    async fn fetch_history(&self, channel: &ChannelId) -> Result<HistorySnapshot> {
        *self.calls.lock().unwrap().entry(channel.clone()).or_insert(0) += 1;
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(channel)
            .and_then(VecDeque::pop_front);

        match next {
            None => Ok(HistorySnapshot::default()),
            Some(Scripted::Ready(result)) => result,
            Some(Scripted::Gated(rx)) => match rx.await {
                Ok(result) => result,
                Err(_) => std::future::pending().await,
            },
            Some(Scripted::Pending) => std::future::pending().await,
        }
    }
}

/// Hands every opened connection's sending half to the test.
#[derive(Default)]
pub struct MockTransport {
    feeds: Mutex<HashMap<ChannelId, mpsc::Sender<TransportEvent>>>,
}

impl MockTransport {
    pub fn feed(&self, channel: &ChannelId) -> mpsc::Sender<TransportEvent> {
        self.feeds
            .lock()
            .unwrap()
            .get(channel)
            .cloned()
            .expect("channel was never opened")
    }

    /// Drop the transport's sender so the connection sees end-of-stream.
    pub fn drop_feed(&self, channel: &ChannelId) {
        self.feeds.lock().unwrap().remove(channel);
    }
}

impl LiveTransport for MockTransport {
    fn open(&self, channel: &ChannelId, buffer: usize) -> LiveConnection {
        let (tx, conn) = LiveConnection::channel(buffer);
        self.feeds.lock().unwrap().insert(channel.clone(), tx);
        conn
    }
}

#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(ChannelId, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_message(&self, channel: &ChannelId, body: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(KiuError::SendFailed("HTTP error! status: 500".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.clone(), body.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub history: Arc<ScriptedHistory>,
    pub transport: Arc<MockTransport>,
    pub sender: Arc<RecordingSender>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            history: Arc::new(ScriptedHistory::default()),
            transport: Arc::new(MockTransport::default()),
            sender: Arc::new(RecordingSender::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.history.clone(),
            self.transport.clone(),
            self.sender.clone(),
        )
    }
}

/// Wait (bounded) until the published view satisfies `pred`.
pub async fn wait_for_view(
    rx: &mut watch::Receiver<ChannelView>,
    pred: impl FnMut(&ChannelView) -> bool,
) -> ChannelView {
    let view = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("timed out waiting for channel view")
        .expect("channel view sender dropped");
    ChannelView::clone(&view)
}
