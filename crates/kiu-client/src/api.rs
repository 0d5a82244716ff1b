//! HTTP access to the chat API: history fetch and message send.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;
use url::Url;

use kiu_shared::error::{KiuError, Result};
use kiu_shared::protocol::{parse_history_body, HistorySnapshot};
use kiu_shared::types::ChannelId;
use kiu_sync::{HistoryFetch, MessageSender};

use crate::error::ClientError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    message: &'a str,
    device_id: &'a str,
}

/// `GET`/`POST {api_base}/api/chat/{channel}`.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    api_base: Url,
    device_id: String,
}

impl HttpApi {
    pub fn new(
        api_base: &str,
        device_id: impl Into<String>,
    ) -> std::result::Result<Self, ClientError> {
        let api_base = parse_base(api_base)?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            api_base,
            device_id: device_id.into(),
        })
    }

    pub fn chat_url(&self, channel: &ChannelId) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "chat", channel.as_str()]);
        }
        url
    }
}

/// Parse a base URL that path segments can be appended to.
pub(crate) fn parse_base(raw: &str) -> std::result::Result<Url, ClientError> {
    let url = Url::parse(raw).map_err(|e| ClientError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl {
            url: raw.to_string(),
            reason: "cannot be used as a base".into(),
        });
    }
    Ok(url)
}

#[async_trait]
impl HistoryFetch for HttpApi {
    async fn fetch_history(&self, channel: &ChannelId) -> Result<HistorySnapshot> {
        let url = self.chat_url(channel);
        debug!(channel = %channel, url = %url, "Fetching history");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KiuError::HistoryFetchFailed(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(KiuError::HistoryFetchFailed(format!(
                "Chat history for {channel} not found."
            )));
        }
        if !status.is_success() {
            return Err(KiuError::HistoryFetchFailed(format!(
                "HTTP error! status: {}",
                status.as_u16()
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| KiuError::HistoryFetchFailed(e.to_string()))?;
        parse_history_body(&body)
    }
}

#[async_trait]
impl MessageSender for HttpApi {
    async fn send_message(&self, channel: &ChannelId, body: &str) -> Result<()> {
        let request = SendRequest {
            message: body,
            device_id: &self.device_id,
        };

        let resp = self
            .client
            .post(self.chat_url(channel))
            .json(&request)
            .send()
            .await
            .map_err(|e| KiuError::SendFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(KiuError::SendFailed(format!(
                "HTTP error! status: {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_url_encodes_channel() {
        let api = HttpApi::new("https://www.borderkiu.com/", "dev-1").unwrap();
        let url = api.chat_url(&ChannelId::from("Miri(SungaiTujuh)"));
        assert_eq!(url.as_str(), "https://www.borderkiu.com/api/chat/Miri(SungaiTujuh)");

        let url = api.chat_url(&ChannelId::from("a b/c"));
        assert_eq!(url.as_str(), "https://www.borderkiu.com/api/chat/a%20b%2Fc");
    }

    #[test]
    fn test_rejects_unusable_base() {
        assert!(matches!(
            HttpApi::new("not a url", "dev-1"),
            Err(ClientError::InvalidUrl { .. })
        ));
        assert!(HttpApi::new("mailto:someone@example.com", "dev-1").is_err());
    }

    #[test]
    fn test_send_request_shape() {
        let body = serde_json::to_value(SendRequest {
            message: "hello",
            device_id: "borderkiu-mobile-app",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"message": "hello", "deviceId": "borderkiu-mobile-app"})
        );
    }
}
