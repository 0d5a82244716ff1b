use serde::Serialize;
use tracing::info;

use kiu_shared::constants::{COMPACT_BADGE_CAP, LIST_BADGE_CAP};
use kiu_shared::types::ChannelId;
use kiu_sync::{ChannelDisplay, ChannelView};

use crate::state::SharedState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummaryDto {
    pub channel_id: String,
    pub unread_count: u32,
    /// Compact badges render "9+" past this point.
    pub unread_over_compact_cap: bool,
    /// List badges render "99+" past this point.
    pub unread_over_list_cap: bool,
    pub preview: Option<String>,
    pub connection_state: String,
    pub status: String,
    pub error: Option<String>,
    pub user_count: Option<u32>,
    pub message_count: usize,
}

impl From<&ChannelView> for ChannelSummaryDto {
    fn from(view: &ChannelView) -> Self {
        let status = match view.display() {
            ChannelDisplay::Loading => "loading",
            ChannelDisplay::Timeline(_) => "ready",
            ChannelDisplay::Error(_) => "error",
        };
        Self {
            channel_id: view.channel_id.to_string(),
            unread_count: view.unread_count,
            unread_over_compact_cap: view.unread_count > COMPACT_BADGE_CAP,
            unread_over_list_cap: view.unread_count > LIST_BADGE_CAP,
            preview: view.preview.clone(),
            connection_state: view.connection_state.to_string(),
            status: status.to_string(),
            error: view.error_message.clone(),
            user_count: view.user_count,
            message_count: view.timeline.len(),
        }
    }
}

pub async fn list_channels(state: &SharedState) -> Vec<ChannelSummaryDto> {
    let guard = state.lock().await;
    guard
        .registry
        .views()
        .iter()
        .map(ChannelSummaryDto::from)
        .collect()
}

pub async fn focus_channel(state: &SharedState, channel_id: String) -> Result<(), String> {
    let id = ChannelId::from(channel_id);
    let mut guard = state.lock().await;
    guard.registry.focus(&id).await.map_err(|e| e.to_string())?;
    info!(channel = %id, "Channel focused");
    Ok(())
}

pub async fn unfocus_channel(state: &SharedState) {
    state.lock().await.registry.unfocus().await;
}

/// Retry affordance for a channel whose history failed to load.
pub async fn refresh_history(state: &SharedState, channel_id: String) -> Result<(), String> {
    let id = ChannelId::from(channel_id);
    let guard = state.lock().await;
    guard
        .registry
        .request_history(&id)
        .await
        .map_err(|e| e.to_string())
}

/// Reconcile subscriptions against an updated channel list.
pub async fn set_channels(
    state: &SharedState,
    channel_ids: Vec<String>,
) -> Result<(usize, usize), String> {
    let ids: Vec<ChannelId> = channel_ids.into_iter().map(ChannelId::from).collect();
    let mut guard = state.lock().await;
    let outcome = guard
        .registry
        .refresh(ids)
        .await
        .map_err(|e| e.to_string())?;
    Ok((outcome.opened.len(), outcome.closed.len()))
}
