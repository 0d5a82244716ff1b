//! The closed message variant type every consumer pattern-matches on.
//!
//! Messages are immutable once constructed. The only way to change a field is
//! to build a new value, which the timeline does when it pins the observation
//! time of an untimestamped history record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Where a message's timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampSource {
    /// The record carried a `timestamp` or `time` field.
    Record,
    /// Defaulted to the time the normalizer observed the record.
    Observed,
}

/// Variant payload of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageBody {
    Text {
        username: String,
        text: String,
        privileged: bool,
    },
    Image {
        username: String,
        /// Full-resolution URL when present, otherwise the thumbnail.
        image_url: String,
        thumbnail_url: Option<String>,
        caption: Option<String>,
        privileged: bool,
    },
    System {
        text: String,
    },
}

/// A normalized chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned id, when the feed provides one.
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub timestamp_source: TimestampSource,
    pub body: MessageBody,
}

/// Identity used to recognize the same message arriving via two paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Id(String),
    Content { millis: i64, fingerprint: String },
}

impl Message {
    pub fn text(
        username: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            timestamp_source: TimestampSource::Record,
            body: MessageBody::Text {
                username: username.into(),
                text: text.into(),
                privileged: false,
            },
        }
    }

    pub fn system(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            timestamp,
            timestamp_source: TimestampSource::Record,
            body: MessageBody::System { text: text.into() },
        }
    }

    /// Same message, re-stamped. Used to pin an observed timestamp.
    pub fn with_timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, ..self }
    }

    pub fn username(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text { username, .. } | MessageBody::Image { username, .. } => {
                Some(username)
            }
            MessageBody::System { .. } => None,
        }
    }

    pub fn is_privileged(&self) -> bool {
        match &self.body {
            MessageBody::Text { privileged, .. } | MessageBody::Image { privileged, .. } => {
                *privileged
            }
            MessageBody::System { .. } => false,
        }
    }

    /// Content fingerprint: trimmed text, or display URL plus caption.
    pub fn fingerprint(&self) -> String {
        match &self.body {
            MessageBody::Text { text, .. } | MessageBody::System { text } => {
                text.trim().to_string()
            }
            MessageBody::Image {
                image_url, caption, ..
            } => match caption {
                Some(caption) => format!("{image_url}\n{}", caption.trim()),
                None => image_url.clone(),
            },
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        match &self.id {
            Some(id) => DedupKey::Id(id.clone()),
            None => DedupKey::Content {
                millis: self.timestamp.timestamp_millis(),
                fingerprint: self.fingerprint(),
            },
        }
    }
}
