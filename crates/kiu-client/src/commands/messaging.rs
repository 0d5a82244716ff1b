use serde::Serialize;
use tracing::info;

use kiu_shared::message::{Message, MessageBody};
use kiu_shared::types::ChannelId;
use kiu_sync::digest;

use crate::state::SharedState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Option<String>,
    pub kind: String,
    pub username: Option<String>,
    pub text: String,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub privileged: bool,
    pub timestamp: String,
}

impl From<&Message> for MessageDto {
    fn from(m: &Message) -> Self {
        let (kind, image_url, thumbnail_url) = match &m.body {
            MessageBody::Text { .. } => ("text", None, None),
            MessageBody::Image {
                image_url,
                thumbnail_url,
                ..
            } => ("image", Some(image_url.clone()), thumbnail_url.clone()),
            MessageBody::System { .. } => ("system", None, None),
        };
        Self {
            id: m.id.clone(),
            kind: kind.to_string(),
            username: m.username().map(str::to_string),
            text: digest(m),
            image_url,
            thumbnail_url,
            privileged: m.is_privileged(),
            timestamp: m.timestamp.to_rfc3339(),
        }
    }
}

pub async fn send_message(
    state: &SharedState,
    channel_id: String,
    content: String,
) -> Result<(), String> {
    let id = ChannelId::from(channel_id);
    let guard = state.lock().await;
    guard
        .registry
        .send_message(&id, &content)
        .await
        .map_err(|e| e.to_string())?;
    info!(channel = %id, "Message sent");
    Ok(())
}

pub async fn get_messages(
    state: &SharedState,
    channel_id: String,
) -> Result<Vec<MessageDto>, String> {
    let id = ChannelId::from(channel_id);
    let guard = state.lock().await;
    let view = guard
        .registry
        .view(&id)
        .ok_or_else(|| format!("Unknown channel: {id}"))?;
    Ok(view.timeline.iter().map(MessageDto::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_image_dto_uses_caption_digest() {
        let message = Message {
            id: Some("42".into()),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            timestamp_source: kiu_shared::message::TimestampSource::Record,
            body: MessageBody::Image {
                username: "ali".into(),
                image_url: "https://cdn/full.jpg".into(),
                thumbnail_url: Some("https://cdn/thumb.jpg".into()),
                caption: None,
                privileged: true,
            },
        };

        let dto = MessageDto::from(&message);
        assert_eq!(dto.kind, "image");
        assert_eq!(dto.text, "ali sent an image");
        assert_eq!(dto.image_url.as_deref(), Some("https://cdn/full.jpg"));
        assert!(dto.privileged);
        assert_eq!(dto.timestamp, "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn test_system_dto_has_no_username() {
        let dto = MessageDto::from(&Message::system("Chat history for X not found.", Utc::now()));
        assert_eq!(dto.kind, "system");
        assert_eq!(dto.username, None);
    }
}
