use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

const GMAIL_MESSAGES_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub id: String,
    pub subject: String,
    /// Plain-text preview of the body as returned by Gmail.
    pub snippet: String,
}

#[async_trait]
pub trait GmailClient: Send + Sync {
    async fn list_recent_messages(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<EmailMessage>, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestGmailClient {
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct MessageListResponse {
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, serde::Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, serde::Deserialize)]
struct MessageResponse {
    id: String,
    #[serde(default)]
    snippet: String,
    payload: Option<MessagePayload>,
}

#[derive(Debug, serde::Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<MessageHeader>,
}

#[derive(Debug, serde::Deserialize)]
struct MessageHeader {
    name: String,
    value: String,
}

impl ReqwestGmailClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn message_endpoint(message_id: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(GMAIL_MESSAGES_ENDPOINT)
            .map_err(|error| InfraError::Remote(format!("invalid gmail endpoint: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| InfraError::Remote("gmail endpoint cannot be a base".to_string()))?
            .push(message_id);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<T, InfraError> {
        let response = request
            .send()
            .await
            .map_err(|error| InfraError::Remote(format!("network error while {action}: {error}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Remote(format!("failed reading response while {action}: {error}")))?;
        if !status.is_success() {
            return Err(InfraError::Remote(format!(
                "gmail api error while {action}: http {}; body={body}",
                status.as_u16()
            )));
        }
        serde_json::from_str(&body).map_err(|error| {
            InfraError::Remote(format!("invalid gmail payload while {action}: {error}"))
        })
    }
}

#[async_trait]
impl GmailClient for ReqwestGmailClient {
    async fn list_recent_messages(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<EmailMessage>, InfraError> {
        if access_token.trim().is_empty() {
            return Err(InfraError::InvalidInput("access token must not be empty".to_string()));
        }

        let listed: MessageListResponse = self
            .get_json(
                self.client
                    .get(GMAIL_MESSAGES_ENDPOINT)
                    .bearer_auth(access_token)
                    .query(&[("q", query)])
                    .query(&[("maxResults", max_results.max(1))]),
                "listing messages",
            )
            .await?;

        let mut messages = Vec::new();
        for message_ref in listed.messages.unwrap_or_default() {
            let endpoint = Self::message_endpoint(&message_ref.id)?;
            let message: MessageResponse = self
                .get_json(
                    self.client
                        .get(endpoint)
                        .bearer_auth(access_token)
                        .query(&[("format", "metadata"), ("metadataHeaders", "Subject")]),
                    "reading message",
                )
                .await?;
            let subject = message
                .payload
                .map(|payload| payload.headers)
                .unwrap_or_default()
                .into_iter()
                .find(|header| header.name.eq_ignore_ascii_case("subject"))
                .map(|header| header.value)
                .unwrap_or_default();
            messages.push(EmailMessage {
                id: message.id,
                subject,
                snippet: decode_entities(&message.snippet),
            });
        }
        Ok(messages)
    }
}

/// Gmail snippets are HTML-escaped.
fn decode_entities(value: &str) -> String {
    value
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_entities_unescapes_snippet() {
        assert_eq!(
            decode_entities("Let&#39;s meet &quot;Monday&quot; &amp; talk"),
            "Let's meet \"Monday\" & talk"
        );
    }

    #[test]
    fn message_payload_without_headers_parses() {
        let parsed: MessageResponse =
            serde_json::from_str(r#"{"id":"m1","snippet":"hi"}"#).expect("parse message");
        assert_eq!(parsed.id, "m1");
        assert!(parsed.payload.is_none());
    }
}
