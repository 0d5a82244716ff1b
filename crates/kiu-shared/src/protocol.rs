use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    EVENT_CHAT_HISTORY, EVENT_CHAT_MESSAGE, EVENT_HISTORY, EVENT_MESSAGE, EVENT_USER_COUNT,
};
use crate::error::{KiuError, Result};

/// A successful history fetch: raw records plus an optional presence count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    pub records: Vec<Value>,
    pub user_count: Option<u32>,
}

impl HistorySnapshot {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            user_count: None,
        }
    }
}

/// Events emitted by a channel's live transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is (re-)established.
    Connected,
    /// The connection dropped; the transport retries on its own.
    Disconnected { reason: String },
    /// A connection attempt failed; the transport retries on its own.
    ConnectError { reason: String },
    /// One pushed record.
    Message(Value),
    /// Bulk records, sometimes re-delivered on reconnect.
    History(HistorySnapshot),
    /// Advisory presence count.
    UserCount(u32),
}

/// Body of the history endpoint: `{chat: [...], userCount?}` or `{error}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryBody {
    Chat {
        chat: Vec<Value>,
        #[serde(default, rename = "userCount")]
        user_count: Option<u32>,
    },
    Error {
        error: String,
    },
}

/// Parse a history response body into an explicit success/failure result.
pub fn parse_history_body(body: &[u8]) -> Result<HistorySnapshot> {
    let parsed: HistoryBody = serde_json::from_slice(body)
        .map_err(|e| KiuError::HistoryFetchFailed(format!("unexpected response body: {e}")))?;

    match parsed {
        HistoryBody::Chat { chat, user_count } => Ok(HistorySnapshot {
            records: chat,
            user_count,
        }),
        HistoryBody::Error { error } => Err(KiuError::HistoryFetchFailed(error)),
    }
}

/// A named event frame on the live feed: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Map a frame onto a transport event. Unknown event names yield `None`.
    pub fn into_transport_event(self) -> Option<TransportEvent> {
        match self.event.as_str() {
            EVENT_MESSAGE | EVENT_CHAT_MESSAGE => Some(TransportEvent::Message(self.data)),
            EVENT_HISTORY | EVENT_CHAT_HISTORY => {
                let records = match self.data {
                    Value::Array(records) => records,
                    Value::Object(mut map) => match map.remove("chat") {
                        Some(Value::Array(records)) => records,
                        _ => return None,
                    },
                    _ => return None,
                };
                Some(TransportEvent::History(HistorySnapshot::new(records)))
            }
            EVENT_USER_COUNT | "userCount" => self
                .data
                .as_u64()
                .map(|n| TransportEvent::UserCount(n.min(u32::MAX as u64) as u32)),
            _ => None,
        }
    }
}
