//! Supervision of all channel subscriptions.
//!
//! The registry is the only component that opens or closes live
//! connections. Channels that survive a refresh keep their subscription and
//! with it their in-memory timeline.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use kiu_shared::error::{KiuError, Result};
use kiu_shared::types::ChannelId;

use crate::channel::ChannelView;
use crate::config::SyncConfig;
use crate::subscription::ChannelSubscription;
use crate::transport::Collaborators;

/// Channels opened and closed by a [`SubscriptionRegistry::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub opened: Vec<ChannelId>,
    pub closed: Vec<ChannelId>,
}

pub struct SubscriptionRegistry {
    collaborators: Collaborators,
    config: SyncConfig,
    subscriptions: HashMap<ChannelId, ChannelSubscription>,
    focused: Option<ChannelId>,
    stopped: bool,
}

impl SubscriptionRegistry {
    pub fn new(collaborators: Collaborators, config: SyncConfig) -> Self {
        Self {
            collaborators,
            config,
            subscriptions: HashMap::new(),
            focused: None,
            stopped: false,
        }
    }

    /// Open one subscription per channel not already subscribed. Returns the
    /// channels that were opened.
    pub fn start<I>(&mut self, channel_ids: I) -> Result<Vec<ChannelId>>
    where
        I: IntoIterator<Item = ChannelId>,
    {
        if self.stopped {
            return Err(KiuError::RegistryStopped);
        }

        let mut opened = Vec::new();
        for id in channel_ids {
            if self.subscriptions.contains_key(&id) {
                continue;
            }
            let sub = ChannelSubscription::open(id.clone(), &self.collaborators, &self.config);
            self.subscriptions.insert(id.clone(), sub);
            opened.push(id);
        }

        info!(
            opened = opened.len(),
            total = self.subscriptions.len(),
            "Started channel subscriptions"
        );
        Ok(opened)
    }

    /// Reconcile against a freshly discovered channel set: open new
    /// channels, close removed ones, leave the rest untouched.
    pub async fn refresh<I>(&mut self, channel_ids: I) -> Result<RefreshOutcome>
    where
        I: IntoIterator<Item = ChannelId>,
    {
        if self.stopped {
            return Err(KiuError::RegistryStopped);
        }

        let wanted: BTreeSet<ChannelId> = channel_ids.into_iter().collect();
        let mut removed: Vec<ChannelId> = self
            .subscriptions
            .keys()
            .filter(|id| !wanted.contains(*id))
            .cloned()
            .collect();
        removed.sort();

        for id in &removed {
            if let Some(mut sub) = self.subscriptions.remove(id) {
                sub.close().await;
            }
            if self.focused.as_ref() == Some(id) {
                self.focused = None;
            }
        }

        let opened = self.start(wanted)?;
        info!(
            opened = opened.len(),
            closed = removed.len(),
            "Refreshed channel set"
        );
        Ok(RefreshOutcome {
            opened,
            closed: removed,
        })
    }

    /// Close every subscription. Only the first call does anything.
    pub async fn stop_all(&mut self) {
        if self.stopped {
            debug!("Registry already stopped");
            return;
        }
        self.stopped = true;
        self.focused = None;

        let count = self.subscriptions.len();
        for (_, mut sub) in self.subscriptions.drain() {
            sub.close().await;
        }
        info!(count, "Stopped all channel subscriptions");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Subscribed channel ids, sorted.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self.subscriptions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.subscriptions.contains_key(id)
    }

    pub fn view(&self, id: &ChannelId) -> Option<ChannelView> {
        self.subscriptions.get(id).map(ChannelSubscription::view)
    }

    /// Views of every channel, sorted by id.
    pub fn views(&self) -> Vec<ChannelView> {
        self.channel_ids()
            .iter()
            .filter_map(|id| self.view(id))
            .collect()
    }

    pub fn watch(&self, id: &ChannelId) -> Option<watch::Receiver<ChannelView>> {
        self.subscriptions.get(id).map(ChannelSubscription::watch)
    }

    pub fn focused(&self) -> Option<&ChannelId> {
        self.focused.as_ref()
    }

    /// Make `id` the open channel: its unread count resets, and the
    /// previously focused channel starts counting again.
    pub async fn focus(&mut self, id: &ChannelId) -> Result<()> {
        let sub = self
            .subscriptions
            .get(id)
            .ok_or_else(|| KiuError::UnknownChannel(id.clone()))?;
        sub.focus().await?;

        if let Some(previous) = self.focused.replace(id.clone()) {
            if &previous != id {
                if let Some(prev_sub) = self.subscriptions.get(&previous) {
                    if let Err(e) = prev_sub.unfocus().await {
                        debug!(channel = %previous, error = %e, "Could not unfocus channel");
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn unfocus(&mut self) {
        if let Some(previous) = self.focused.take() {
            if let Some(sub) = self.subscriptions.get(&previous) {
                if let Err(e) = sub.unfocus().await {
                    debug!(channel = %previous, error = %e, "Could not unfocus channel");
                }
            }
        }
    }

    /// Explicit, user-triggered history refresh (the retry affordance).
    pub async fn request_history(&self, id: &ChannelId) -> Result<()> {
        self.subscription(id)?
            .refresh_history(std::time::Duration::ZERO)
            .await
    }

    /// Send a message. A confirmed send schedules a history refresh to pick
    /// up the echo; a failed one leaves the timeline untouched.
    pub async fn send_message(&self, id: &ChannelId, body: &str) -> Result<()> {
        let body = body.trim();
        if body.is_empty() {
            return Err(KiuError::EmptyMessage);
        }
        let sub = self.subscription(id)?;

        if let Err(e) = self.collaborators.sender.send_message(id, body).await {
            warn!(channel = %id, error = %e, "Send failed");
            return Err(match e {
                KiuError::SendFailed(_) => e,
                other => KiuError::SendFailed(other.to_string()),
            });
        }

        if let Err(e) = sub.refresh_history(self.config.send_refresh_delay).await {
            debug!(channel = %id, error = %e, "Could not schedule post-send refresh");
        }
        Ok(())
    }

    fn subscription(&self, id: &ChannelId) -> Result<&ChannelSubscription> {
        self.subscriptions
            .get(id)
            .ok_or_else(|| KiuError::UnknownChannel(id.clone()))
    }
}
