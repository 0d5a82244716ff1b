use kiu_shared::message::{Message, MessageBody};

/// One-line preview of a message for channel-list summaries.
pub fn digest(message: &Message) -> String {
    match &message.body {
        MessageBody::Text { text, .. } => text.clone(),
        MessageBody::Image {
            caption: Some(caption),
            ..
        } => caption.clone(),
        MessageBody::Image { username, .. } => format!("{username} sent an image"),
        MessageBody::System { text } => text.clone(),
    }
}

/// Cached preview of a channel's most recent message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewDigest {
    current: Option<String>,
}

impl PreviewDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute from the last message of the merged timeline. Returns
    /// whether the preview changed.
    pub fn refresh(&mut self, last: Option<&Message>) -> bool {
        let next = last.map(digest);
        if next == self.current {
            return false;
        }
        self.current = next;
        true
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kiu_shared::message::TimestampSource;

    fn image(caption: Option<&str>) -> Message {
        Message {
            id: None,
            timestamp: Utc.timestamp_opt(1, 0).unwrap(),
            timestamp_source: TimestampSource::Record,
            body: MessageBody::Image {
                username: "siti".into(),
                image_url: "x".into(),
                thumbnail_url: None,
                caption: caption.map(str::to_string),
                privileged: false,
            },
        }
    }

    #[test]
    fn test_digest_variants() {
        let ts = Utc.timestamp_opt(1, 0).unwrap();
        assert_eq!(digest(&Message::text("ali", "queue moving", ts)), "queue moving");
        assert_eq!(digest(&Message::system("maintenance at 2am", ts)), "maintenance at 2am");
        assert_eq!(digest(&image(Some("long line"))), "long line");
        assert_eq!(digest(&image(None)), "siti sent an image");
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let mut preview = PreviewDigest::new();
        let last = image(None);

        assert!(preview.refresh(Some(&last)));
        assert!(!preview.refresh(Some(&last)));
        assert_eq!(preview.current(), Some("siti sent an image"));

        assert!(preview.refresh(None));
        assert_eq!(preview.current(), None);
    }
}
