//! One live subscription per channel.
//!
//! Each subscription runs its channel in a dedicated tokio task. The task is
//! the only writer of the channel's state: registry commands, live transport
//! events, the in-flight history fetch, and the scheduled refresh timer are
//! all multiplexed through one `select!` loop, so their effects on the
//! timeline are serialized no matter which completes first.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use kiu_shared::error::{KiuError, Result};
use kiu_shared::protocol::{HistorySnapshot, TransportEvent};
use kiu_shared::types::ChannelId;

use crate::channel::{ChannelState, ChannelView};
use crate::config::SyncConfig;
use crate::timeline::LiveAppend;
use crate::transport::{Collaborators, HistoryFetch, LiveConnection};

/// Commands sent *into* a subscription task.
#[derive(Debug)]
pub enum ChannelCommand {
    /// The channel became the focused one; clears unread.
    Focus,
    Unfocus,
    /// Re-fetch history after `delay` (zero for immediately).
    RefreshHistory { delay: Duration },
    /// Release the transport and stop the task.
    Close,
}

/// Handle to a running channel subscription.
pub struct ChannelSubscription {
    channel_id: ChannelId,
    cmd_tx: mpsc::Sender<ChannelCommand>,
    view_rx: watch::Receiver<ChannelView>,
    task: Option<JoinHandle<()>>,
}

impl ChannelSubscription {
    /// Open the live connection, issue the initial history fetch, and spawn
    /// the channel task. Neither the fetch nor the connection waits for the
    /// other.
    pub fn open(channel_id: ChannelId, collaborators: &Collaborators, config: &SyncConfig) -> Self {
        let state = ChannelState::new(channel_id.clone());
        let (view_tx, view_rx) = watch::channel(state.view());
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.max(1));
        let live = collaborators.transport.open(&channel_id, config.event_buffer);

        let worker = SubscriptionWorker {
            state,
            history: collaborators.history.clone(),
            config: config.clone(),
            view_tx,
        };
        let task = tokio::spawn(worker.run(cmd_rx, live));

        info!(channel = %channel_id, "Opened channel subscription");

        Self {
            channel_id,
            cmd_tx,
            view_rx,
            task: Some(task),
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Latest published view.
    pub fn view(&self) -> ChannelView {
        self.view_rx.borrow().clone()
    }

    /// Receiver notified on every published change.
    pub fn watch(&self) -> watch::Receiver<ChannelView> {
        self.view_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }

    pub async fn focus(&self) -> Result<()> {
        self.command(ChannelCommand::Focus).await
    }

    pub async fn unfocus(&self) -> Result<()> {
        self.command(ChannelCommand::Unfocus).await
    }

    pub async fn refresh_history(&self, delay: Duration) -> Result<()> {
        self.command(ChannelCommand::RefreshHistory { delay }).await
    }

    /// Unregister from the transport and stop the task. Closing an already
    /// closed subscription is a no-op.
    pub async fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let _ = self.cmd_tx.send(ChannelCommand::Close).await;
        if let Err(e) = task.await {
            warn!(channel = %self.channel_id, error = %e, "Channel task ended abnormally");
        }
        info!(channel = %self.channel_id, "Closed channel subscription");
    }

    async fn command(&self, cmd: ChannelCommand) -> Result<()> {
        if self.task.is_none() {
            return Err(KiuError::SubscriptionClosed);
        }
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| KiuError::SubscriptionClosed)
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Channel task
// ---------------------------------------------------------------------------

type HistoryFuture = BoxFuture<'static, Result<HistorySnapshot>>;

struct SubscriptionWorker {
    state: ChannelState,
    history: Arc<dyn HistoryFetch>,
    config: SyncConfig,
    view_tx: watch::Sender<ChannelView>,
}

impl SubscriptionWorker {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<ChannelCommand>, mut live: LiveConnection) {
        // A newer request replaces the in-flight one; dropping the old future
        // discards its result, so a stale snapshot never lands.
        let mut fetch: Option<HistoryFuture> = Some(self.start_fetch());
        let mut refresh_timer: Option<Pin<Box<Sleep>>> = None;
        let mut live_open = true;

        loop {
            tokio::select! {
                // Registry commands first: a queued unfocus or close must take
                // effect before pushes that arrived after it was issued.
                biased;

                cmd = cmd_rx.recv() => match cmd {
                    Some(ChannelCommand::Focus) => {
                        self.state.focus();
                        self.publish();
                    }
                    Some(ChannelCommand::Unfocus) => {
                        self.state.unfocus();
                        self.publish();
                    }
                    Some(ChannelCommand::RefreshHistory { delay }) => {
                        if delay.is_zero() {
                            fetch = Some(self.start_fetch());
                        } else {
                            refresh_timer = Some(Box::pin(tokio::time::sleep(delay)));
                        }
                    }
                    Some(ChannelCommand::Close) | None => break,
                },

                event = live.next_event(), if live_open => match event {
                    Some(event) => {
                        if self.handle_event(event) {
                            fetch = Some(self.start_fetch());
                        }
                    }
                    None => {
                        live_open = false;
                        warn!(channel = %self.state.id(), "Live transport ended");
                        self.state.on_transport_ended();
                        self.publish();
                    }
                },

                result = poll_slot(&mut fetch) => {
                    fetch = None;
                    self.apply_fetch(result);
                }

                _ = poll_slot(&mut refresh_timer) => {
                    refresh_timer = None;
                    fetch = Some(self.start_fetch());
                }
            }
        }

        if fetch.is_some() {
            debug!(channel = %self.state.id(), "Discarding in-flight history fetch");
        }
        live.close();
        self.state.close();
        self.publish();
    }

    fn start_fetch(&self) -> HistoryFuture {
        let history = self.history.clone();
        let channel = self.state.id().clone();
        debug!(channel = %channel, "Fetching history");
        Box::pin(async move { history.fetch_history(&channel).await })
    }

    fn apply_fetch(&mut self, result: Result<HistorySnapshot>) {
        match result {
            Ok(snapshot) => self.apply_history(&snapshot),
            Err(e) => {
                warn!(channel = %self.state.id(), error = %e, "History fetch failed");
                self.state.history_failed(&e);
                self.publish();
            }
        }
    }

    fn apply_history(&mut self, snapshot: &HistorySnapshot) {
        let load = self.state.apply_history(snapshot, Utc::now());
        debug!(
            channel = %self.state.id(),
            accepted = load.accepted,
            duplicates = load.duplicates,
            malformed = load.malformed,
            "History applied"
        );
        self.publish();
    }

    /// Returns `true` when a history refresh should be started.
    fn handle_event(&mut self, event: TransportEvent) -> bool {
        let channel = self.state.id().clone();
        match event {
            TransportEvent::Connected => {
                let reconnected = self.state.on_connected();
                info!(channel = %channel, reconnected, "Live feed connected");
                self.publish();
                return reconnected && self.config.refresh_on_reconnect;
            }
            TransportEvent::Disconnected { reason } => {
                info!(channel = %channel, reason = %reason, "Live feed disconnected");
                self.state.on_disconnected();
                self.publish();
            }
            TransportEvent::ConnectError { reason } => {
                warn!(channel = %channel, reason = %reason, "Live feed connect error");
                self.state.on_connect_error(&reason);
                self.publish();
            }
            TransportEvent::Message(raw) => match self.state.apply_live(&raw, Utc::now()) {
                Ok(Some(LiveAppend::Inserted)) => self.publish(),
                Ok(Some(LiveAppend::Duplicate)) => {
                    debug!(channel = %channel, "Live push already in timeline");
                }
                Ok(None) => {
                    debug!(
                        channel = %channel,
                        state = %self.state.connection(),
                        "Dropping live push while not open"
                    );
                }
                Err(e) => {
                    debug!(channel = %channel, error = %e, "Dropping malformed live push");
                }
            },
            TransportEvent::History(snapshot) => self.apply_history(&snapshot),
            TransportEvent::UserCount(count) => {
                self.state.set_user_count(count);
                self.publish();
            }
        }
        false
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.state.view());
    }
}

/// Await the future in `slot`, or never resolve when the slot is empty.
async fn poll_slot<F>(slot: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}
