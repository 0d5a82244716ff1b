//! Per-channel state and its read-only presentation view.
//!
//! A [`ChannelState`] exclusively owns its timeline, unread tracker, and
//! preview cache. It is mutated only from its subscription's task; observers
//! receive [`ChannelView`] snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use kiu_shared::error::{KiuError, Result};
use kiu_shared::message::Message;
use kiu_shared::protocol::HistorySnapshot;
use kiu_shared::types::{ChannelId, ConnectionState};

use crate::digest::PreviewDigest;
use crate::timeline::{ChannelTimeline, HistoryLoad, LiveAppend};
use crate::unread::UnreadTracker;

/// What the presentation layer should render for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDisplay<'a> {
    /// Nothing has arrived yet and no error is known.
    Loading,
    Timeline(&'a [Message]),
    /// Nothing to show; render a retry affordance.
    Error(&'a str),
}

/// Presentation snapshot of one channel.
#[derive(Debug, Clone)]
pub struct ChannelView {
    pub channel_id: ChannelId,
    pub timeline: Arc<Vec<Message>>,
    pub unread_count: u32,
    pub preview: Option<String>,
    pub connection_state: ConnectionState,
    pub error_message: Option<String>,
    /// Advisory presence count from the feed, when available.
    pub user_count: Option<u32>,
    pub history_loaded: bool,
    pub malformed_count: u64,
}

impl ChannelView {
    /// Partial data always wins over an error: a channel whose history
    /// failed but whose live feed delivered messages shows those messages.
    pub fn display(&self) -> ChannelDisplay<'_> {
        if !self.timeline.is_empty() {
            return ChannelDisplay::Timeline(&self.timeline);
        }
        match (&self.error_message, self.history_loaded) {
            (Some(error), _) => ChannelDisplay::Error(error),
            (None, false) => ChannelDisplay::Loading,
            (None, true) => ChannelDisplay::Timeline(&[]),
        }
    }
}

#[derive(Debug)]
pub struct ChannelState {
    id: ChannelId,
    timeline: ChannelTimeline,
    unread: UnreadTracker,
    digest: PreviewDigest,
    connection: ConnectionState,
    history_loaded: bool,
    history_error: Option<String>,
    transport_error: Option<String>,
    user_count: Option<u32>,
    focused: bool,
}

impl ChannelState {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            timeline: ChannelTimeline::new(),
            unread: UnreadTracker::new(),
            digest: PreviewDigest::new(),
            connection: ConnectionState::Connecting,
            history_loaded: false,
            history_error: None,
            transport_error: None,
            user_count: None,
            focused: false,
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn timeline(&self) -> &ChannelTimeline {
        &self.timeline
    }

    pub fn unread(&self) -> &UnreadTracker {
        &self.unread
    }

    pub fn preview(&self) -> Option<&str> {
        self.digest.current()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Apply a history snapshot, whether fetched or pushed by the feed.
    pub fn apply_history(
        &mut self,
        snapshot: &HistorySnapshot,
        observed_at: DateTime<Utc>,
    ) -> HistoryLoad {
        let load = self.timeline.load_history(&snapshot.records, observed_at);
        self.history_loaded = true;
        self.history_error = None;
        if snapshot.user_count.is_some() {
            self.user_count = snapshot.user_count;
        }
        self.digest.refresh(self.timeline.last());
        load
    }

    pub fn history_failed(&mut self, error: &KiuError) {
        self.history_error = Some(error.to_string());
    }

    /// Apply one live push. Returns `Ok(None)` when the connection is not
    /// accepting pushes.
    pub fn apply_live(
        &mut self,
        raw: &Value,
        observed_at: DateTime<Utc>,
    ) -> Result<Option<LiveAppend>> {
        if !self.connection.accepts_live() {
            return Ok(None);
        }

        let outcome = self.timeline.append_live(raw, observed_at)?;
        if outcome == LiveAppend::Inserted {
            if !self.focused {
                self.unread.increment();
            }
            self.digest.refresh(self.timeline.last());
        }
        Ok(Some(outcome))
    }

    /// Returns `true` when this re-establishes a dropped connection.
    pub fn on_connected(&mut self) -> bool {
        let previous = self.connection;
        if previous == ConnectionState::Closed {
            return false;
        }
        self.connection = ConnectionState::Open;
        self.transport_error = None;
        previous == ConnectionState::Reconnecting
    }

    pub fn on_disconnected(&mut self) {
        if matches!(self.connection, ConnectionState::Open | ConnectionState::Connecting) {
            self.connection = ConnectionState::Reconnecting;
        }
    }

    pub fn on_connect_error(&mut self, reason: &str) {
        if self.connection == ConnectionState::Closed {
            return;
        }
        if self.connection == ConnectionState::Open {
            self.connection = ConnectionState::Reconnecting;
        }
        self.transport_error =
            Some(KiuError::TransportConnectFailed(reason.to_string()).to_string());
    }

    /// The transport stopped emitting events and will not retry.
    pub fn on_transport_ended(&mut self) {
        self.connection = ConnectionState::Closed;
        self.transport_error =
            Some(KiuError::TransportDisconnected("live feed ended".into()).to_string());
    }

    pub fn set_user_count(&mut self, count: u32) {
        self.user_count = Some(count);
    }

    pub fn focus(&mut self) {
        self.focused = true;
        self.unread.reset();
    }

    pub fn unfocus(&mut self) {
        self.focused = false;
    }

    pub fn close(&mut self) {
        self.connection = ConnectionState::Closed;
    }

    pub fn view(&self) -> ChannelView {
        ChannelView {
            channel_id: self.id.clone(),
            timeline: Arc::new(self.timeline.snapshot()),
            unread_count: self.unread.count(),
            preview: self.digest.current().map(str::to_string),
            connection_state: self.connection,
            error_message: self.history_error.clone().or_else(|| self.transport_error.clone()),
            user_count: self.user_count,
            history_loaded: self.history_loaded,
            malformed_count: self.timeline.malformed_count(),
        }
    }
}
