//! WebSocket live feed for one channel.
//!
//! Each opened channel gets its own connection task. The task reconnects
//! with doubling backoff until the subscription drops its receiver, which is
//! the only way it ever stops.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use kiu_shared::constants::EVENT_JOIN;
use kiu_shared::protocol::{EventFrame, TransportEvent};
use kiu_shared::types::ChannelId;
use kiu_sync::{LiveConnection, LiveTransport};

use crate::api::parse_base;
use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn next(&self, current: Duration) -> Duration {
        (current + current).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
        }
    }
}

/// `{socket_base}/{channel}?deviceIdentifier={device_id}`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    socket_base: Url,
    device_id: String,
    backoff: Backoff,
}

impl WsTransport {
    pub fn new(
        socket_base: &str,
        device_id: impl Into<String>,
        backoff: Backoff,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            socket_base: parse_base(socket_base)?,
            device_id: device_id.into(),
            backoff,
        })
    }

    pub fn channel_url(&self, channel: &ChannelId) -> Url {
        let mut url = self.socket_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(channel.as_str());
        }
        url.query_pairs_mut()
            .append_pair("deviceIdentifier", &self.device_id);
        url
    }
}

impl LiveTransport for WsTransport {
    fn open(&self, channel: &ChannelId, buffer: usize) -> LiveConnection {
        let (tx, conn) = LiveConnection::channel(buffer);
        tokio::spawn(feed_loop(
            self.channel_url(channel),
            channel.clone(),
            tx,
            self.backoff,
        ));
        conn
    }
}

/// Decode one text frame. Frames that are not event envelopes, or carry
/// events this client does not consume, yield `None`.
pub fn decode_frame(text: &str) -> Option<TransportEvent> {
    match EventFrame::from_text(text) {
        Ok(frame) => frame.into_transport_event(),
        Err(e) => {
            debug!(error = %e, "Ignoring undecodable frame");
            None
        }
    }
}

async fn feed_loop(
    url: Url,
    channel: ChannelId,
    tx: mpsc::Sender<TransportEvent>,
    backoff: Backoff,
) {
    let mut delay = backoff.initial;

    loop {
        let connect = tokio::select! {
            _ = tx.closed() => return,
            result = connect_async(url.clone()) => result,
        };

        let (mut ws, _) = match connect {
            Ok(value) => value,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Live feed connect failed");
                let event = TransportEvent::ConnectError {
                    reason: e.to_string(),
                };
                if tx.send(event).await.is_err() || !pause(&tx, delay).await {
                    return;
                }
                delay = backoff.next(delay);
                continue;
            }
        };
        delay = backoff.initial;

        let join = EventFrame::new(EVENT_JOIN, Value::String(channel.to_string()));
        let joined = match join.to_text() {
            Ok(text) => ws.send(WsMessage::Text(text)).await.is_ok(),
            Err(_) => false,
        };
        if !joined {
            warn!(channel = %channel, "Live feed join failed");
            let _ = ws.close(None).await;
            if !pause(&tx, delay).await {
                return;
            }
            delay = backoff.next(delay);
            continue;
        }

        info!(channel = %channel, "Live feed connected");
        if tx.send(TransportEvent::Connected).await.is_err() {
            let _ = ws.close(None).await;
            return;
        }

        let reason = loop {
            tokio::select! {
                _ = tx.closed() => {
                    let _ = ws.close(None).await;
                    return;
                }
                frame = ws.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(event) = decode_frame(&text) {
                            if tx.send(event).await.is_err() {
                                let _ = ws.close(None).await;
                                return;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => break "closed by server".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_string(),
                },
            }
        };

        warn!(channel = %channel, reason = %reason, "Live feed disconnected");
        if tx.send(TransportEvent::Disconnected { reason }).await.is_err()
            || !pause(&tx, delay).await
        {
            return;
        }
        delay = backoff.next(delay);
    }
}

/// Sleep before the next attempt. Returns `false` when the subscription went
/// away in the meantime.
async fn pause(tx: &mpsc::Sender<TransportEvent>, delay: Duration) -> bool {
    tokio::select! {
        _ = tx.closed() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
