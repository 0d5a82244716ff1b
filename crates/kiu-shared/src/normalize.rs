//! Record normalization.
//!
//! History and live records never share a guaranteed schema, so every field
//! is probed forgivingly here, once, and the rest of the system only ever
//! sees [`Message`].

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::constants::{ANONYMOUS, SECONDS_TIMESTAMP_LIMIT};
use crate::error::{KiuError, Result};
use crate::message::{Message, MessageBody, TimestampSource};

const PRIVILEGE_FLAGS: [&str; 4] = ["isDeveloper", "isModerator", "isPrivileged", "isDev"];

/// Maps raw records into [`Message`] variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageNormalizer;

impl MessageNormalizer {
    /// Normalize one raw record.
    ///
    /// `observed_at` is used as the timestamp when the record carries none.
    /// Bare strings are legacy history entries and become anonymous text.
    pub fn normalize(raw: &Value, observed_at: DateTime<Utc>) -> Result<Message> {
        match raw {
            Value::Object(map) => Ok(normalize_object(map, observed_at)),
            Value::String(s) if !s.trim().is_empty() => Ok(Message {
                id: None,
                timestamp: observed_at,
                timestamp_source: TimestampSource::Observed,
                body: MessageBody::Text {
                    username: ANONYMOUS.to_string(),
                    text: s.clone(),
                    privileged: false,
                },
            }),
            Value::String(_) => Err(KiuError::MalformedRecord("empty legacy entry".into())),
            other => Err(KiuError::MalformedRecord(format!(
                "expected an object, got {}",
                value_kind(other)
            ))),
        }
    }
}

fn normalize_object(map: &Map<String, Value>, observed_at: DateTime<Utc>) -> Message {
    let kind = str_field(map, "type").map(|t| t.to_ascii_lowercase());
    let username = str_field(map, "username").unwrap_or(ANONYMOUS).to_string();
    let privileged = PRIVILEGE_FLAGS
        .iter()
        .any(|flag| map.get(*flag).and_then(Value::as_bool).unwrap_or(false));

    let parsed = ["timestamp", "time"]
        .iter()
        .find_map(|key| map.get(*key).and_then(parse_timestamp));
    let (timestamp, timestamp_source) = match parsed {
        Some(ts) => (ts, TimestampSource::Record),
        None => (observed_at, TimestampSource::Observed),
    };

    let message = str_field(map, "message");
    let caption = str_field(map, "caption");
    let error = str_field(map, "error");
    let image_url = str_field(map, "imageUrl");
    let thumbnail_url = str_field(map, "imageThumbnailUrl");
    let is_image = kind.as_deref() == Some("image");

    let is_system = matches!(kind.as_deref(), Some("system") | Some("error"))
        || (error.is_some()
            && message.is_none()
            && caption.is_none()
            && image_url.is_none()
            && thumbnail_url.is_none());

    let body = if is_system {
        MessageBody::System {
            text: message
                .or(error)
                .or(caption)
                .unwrap_or("System notice")
                .to_string(),
        }
    } else if let (true, Some(display)) = (is_image, image_url.or(thumbnail_url)) {
        MessageBody::Image {
            username,
            image_url: display.to_string(),
            thumbnail_url: thumbnail_url.map(str::to_string),
            caption: caption.map(str::to_string),
            privileged,
        }
    } else if let Some(text) = message.or(caption) {
        MessageBody::Text {
            username,
            text: text.to_string(),
            privileged,
        }
    } else {
        let what = if is_image { "an image" } else { "a message" };
        MessageBody::Text {
            text: format!("{username} sent {what}"),
            username,
            privileged,
        }
    };

    Message {
        id: id_field(map),
        timestamp,
        timestamp_source,
        body,
    }
}

/// Non-blank string field. Empty strings count as absent.
fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn id_field(map: &Map<String, Value>) -> Option<String> {
    ["id", "_id"].iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().and_then(from_epoch).or_else(|| {
                DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            })
        }
        _ => None,
    }
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n.unsigned_abs() < SECONDS_TIMESTAMP_LIMIT.unsigned_abs() {
        Utc.timestamp_opt(n, 0).single()
    } else {
        Utc.timestamp_millis_opt(n).single()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_rejects_non_objects() {
        for raw in [json!(null), json!(42), json!([1, 2]), json!(true), json!("  ")] {
            let err = MessageNormalizer::normalize(&raw, now()).unwrap_err();
            assert!(matches!(err, KiuError::MalformedRecord(_)));
        }
    }

    #[test]
    fn test_text_prefers_message_over_caption() {
        let raw =
            json!({"username": "ali", "message": "hello", "caption": "ignored", "timestamp": 5});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert_eq!(
            m.body,
            MessageBody::Text {
                username: "ali".into(),
                text: "hello".into(),
                privileged: false
            }
        );
        assert_eq!(m.timestamp, Utc.timestamp_opt(5, 0).unwrap());
        assert_eq!(m.timestamp_source, TimestampSource::Record);
    }

    #[test]
    fn test_caption_only_becomes_text() {
        let raw = json!({"username": "ali", "caption": "look at this"});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert!(matches!(m.body, MessageBody::Text { ref text, .. } if text == "look at this"));
        assert_eq!(m.timestamp, now());
        assert_eq!(m.timestamp_source, TimestampSource::Observed);
    }

    #[test]
    fn test_image_with_empty_caption() {
        let raw = json!({"type": "image", "imageUrl": "x", "caption": "", "username": "siti"});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert_eq!(
            m.body,
            MessageBody::Image {
                username: "siti".into(),
                image_url: "x".into(),
                thumbnail_url: None,
                caption: None,
                privileged: false,
            }
        );
    }

    #[test]
    fn test_image_prefers_full_resolution_url() {
        let raw =
            json!({"type": "image", "imageUrl": "full.jpg", "imageThumbnailUrl": "thumb.jpg"});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        match m.body {
            MessageBody::Image {
                image_url,
                thumbnail_url,
                username,
                ..
            } => {
                assert_eq!(image_url, "full.jpg");
                assert_eq!(thumbnail_url.as_deref(), Some("thumb.jpg"));
                assert_eq!(username, ANONYMOUS);
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn test_image_thumbnail_only_is_displayed() {
        let raw = json!({"type": "image", "imageThumbnailUrl": "thumb.jpg"});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert!(
            matches!(m.body, MessageBody::Image { ref image_url, .. } if image_url == "thumb.jpg")
        );
    }

    #[test]
    fn test_image_url_without_type_marker_falls_through() {
        let raw = json!({"imageUrl": "x.jpg", "username": "ali"});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert!(
            matches!(m.body, MessageBody::Text { ref text, .. } if text == "ali sent a message")
        );
    }

    #[test]
    fn test_fallback_bodies() {
        let raw = json!({"username": "ali"});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert!(
            matches!(m.body, MessageBody::Text { ref text, .. } if text == "ali sent a message")
        );

        let raw = json!({"type": "image"});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert!(matches!(
            m.body,
            MessageBody::Text { ref text, .. } if text == "Anonymous sent an image"
        ));
    }

    #[test]
    fn test_legacy_string_entry() {
        let m = MessageNormalizer::normalize(&json!("bridge is jammed"), now()).unwrap();
        assert_eq!(m.username(), Some(ANONYMOUS));
        assert_eq!(m.timestamp_source, TimestampSource::Observed);
        assert!(matches!(m.body, MessageBody::Text { ref text, .. } if text == "bridge is jammed"));
    }

    #[test]
    fn test_system_and_error_records() {
        let raw =
            json!({"type": "system", "message": "chat restarted", "time": 1_700_000_000_000i64});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert_eq!(m.body, MessageBody::System { text: "chat restarted".into() });
        assert_eq!(m.timestamp, Utc.timestamp_millis_opt(1_700_000_000_000).unwrap());

        let raw = json!({"error": "rate limited"});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert_eq!(m.body, MessageBody::System { text: "rate limited".into() });
    }

    #[test]
    fn test_privilege_flag_and_server_id() {
        let raw = json!({"_id": 77, "username": "dev", "message": "fixed", "isDeveloper": true});
        let m = MessageNormalizer::normalize(&raw, now()).unwrap();
        assert!(m.is_privileged());
        assert_eq!(m.id.as_deref(), Some("77"));
    }

    #[test]
    fn test_timestamp_formats() {
        let rfc = json!({"message": "a", "timestamp": "2024-05-01T10:00:00Z"});
        let m = MessageNormalizer::normalize(&rfc, now()).unwrap();
        assert_eq!(m.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let numeric = json!({"message": "a", "timestamp": "1714557600"});
        let m = MessageNormalizer::normalize(&numeric, now()).unwrap();
        assert_eq!(m.timestamp.timestamp(), 1_714_557_600);

        let garbage = json!({"message": "a", "timestamp": "yesterday"});
        let m = MessageNormalizer::normalize(&garbage, now()).unwrap();
        assert_eq!(m.timestamp_source, TimestampSource::Observed);
    }

    #[test]
    fn test_extreme_timestamps_fall_back_to_observed() {
        let extremes = [
            json!(i64::MIN),
            json!(i64::MAX),
            json!(u64::MAX),
            json!(i64::MIN.to_string()),
            json!(-1e300),
        ];
        for ts in extremes {
            let raw = json!({"message": "x", "timestamp": ts});
            let m = MessageNormalizer::normalize(&raw, now()).unwrap();
            assert_eq!(m.timestamp_source, TimestampSource::Observed, "timestamp {ts}");
            assert_eq!(m.timestamp, now());
        }
    }

    #[test]
    fn test_unparsable_timestamp_falls_through_to_time() {
        for ts in [json!("yesterday"), json!(null)] {
            let raw = json!({"message": "x", "timestamp": ts, "time": 1_714_557_600});
            let m = MessageNormalizer::normalize(&raw, now()).unwrap();
            assert_eq!(m.timestamp_source, TimestampSource::Record);
            assert_eq!(m.timestamp.timestamp(), 1_714_557_600);
        }
    }
}
