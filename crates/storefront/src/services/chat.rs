//! Shopping assistant chat client.
//!
//! Talks to the chat proxy, which forwards the conversation to the completion
//! provider. The proxy's limits are checked before sending so oversized
//! conversations never leave the client.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use vitrine_core::ChatRole;

use crate::models::Session;

/// Most messages the proxy accepts per request.
pub const MAX_MESSAGES: usize = 20;

/// Longest accepted message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Largest accepted serialized request body, in characters.
pub const MAX_PAYLOAD_CHARS: usize = 10_000;

/// Errors that can occur when chatting.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("the conversation is empty")]
    EmptyConversation,

    #[error("too many messages (max {max})")]
    TooManyMessages { max: usize },

    #[error("message {index} is too long (max {max} characters)")]
    MessageTooLong { index: usize, max: usize },

    #[error("conversation is too large to send")]
    PayloadTooLarge,

    /// Proxy rejected the payload.
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("sign in to use the assistant")]
    Unauthorized,

    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Proxy failed without a fallback reply.
    #[error("assistant unavailable: {status}")]
    Unavailable { status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
}

/// Reply body; the proxy uses `message`, older deployments `response`.
#[derive(Debug, Default, Deserialize)]
struct ChatReply {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ChatReply {
    fn text(self) -> Option<String> {
        self.message
            .or(self.response)
            .filter(|text| !text.trim().is_empty())
    }
}

/// Check a conversation against the proxy's limits and serialize it.
///
/// # Errors
///
/// Returns the first limit the conversation breaks.
pub fn encode_request(messages: &[ChatMessage]) -> Result<String, ChatError> {
    if messages.is_empty() {
        return Err(ChatError::EmptyConversation);
    }
    if messages.len() > MAX_MESSAGES {
        return Err(ChatError::TooManyMessages { max: MAX_MESSAGES });
    }
    if let Some(index) = messages
        .iter()
        .position(|m| m.content.chars().count() > MAX_MESSAGE_CHARS)
    {
        return Err(ChatError::MessageTooLong {
            index,
            max: MAX_MESSAGE_CHARS,
        });
    }
    let body = serde_json::to_string(&ChatRequest { messages })
        .map_err(|e| ChatError::Parse(e.to_string()))?;
    if body.chars().count() > MAX_PAYLOAD_CHARS {
        return Err(ChatError::PayloadTooLarge);
    }
    Ok(body)
}

/// Chat proxy client.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ChatClientInner>,
}

struct ChatClientInner {
    client: reqwest::Client,
    endpoint: Url,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Create a client for the proxy at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(endpoint: Url) -> Result<Self, ChatError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(ChatClientInner { client, endpoint }),
        })
    }

    /// Send the conversation and return the assistant's reply.
    ///
    /// On a server error the proxy may still include a canned reply; it is
    /// returned as a normal answer.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation breaks a limit, the session is
    /// rejected or the proxy fails without a fallback.
    #[instrument(skip(self, session, messages), fields(messages = messages.len()))]
    pub async fn send(
        &self,
        session: &Session,
        messages: &[ChatMessage],
    ) -> Result<String, ChatError> {
        let body = encode_request(messages)?;

        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .bearer_auth(&session.access_token)
            .body(body)
            .send()
            .await?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            tracing::warn!(retry_after, "Chat proxy rate limited");
            return Err(ChatError::RateLimited(retry_after));
        }

        let text = response.text().await?;
        let reply: ChatReply = serde_json::from_str(&text).unwrap_or_default();

        match status.as_u16() {
            200..=299 => reply.text().ok_or_else(|| {
                tracing::error!(body = %truncate(&text), "Chat reply without text");
                ChatError::Parse("reply has no message".to_string())
            }),
            400 | 413 => {
                let message = reply.error.unwrap_or_else(|| truncate(&text));
                tracing::warn!(
                    status = status.as_u16(),
                    message = %message,
                    "Chat request rejected"
                );
                if status.as_u16() == 413 {
                    Err(ChatError::PayloadTooLarge)
                } else {
                    Err(ChatError::BadRequest(message))
                }
            }
            401 | 403 => Err(ChatError::Unauthorized),
            code => {
                tracing::error!(status = code, body = %truncate(&text), "Chat proxy error");
                reply.text().ok_or(ChatError::Unavailable { status: code })
            }
        }
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(500).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_request_shape() {
        let body = encode_request(&[
            ChatMessage::user("Tem fone com cancelamento de ruído?"),
            ChatMessage::assistant("Temos sim!"),
        ])
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_limits() {
        assert!(matches!(encode_request(&[]), Err(ChatError::EmptyConversation)));

        let many = vec![ChatMessage::user("oi"); MAX_MESSAGES + 1];
        assert!(matches!(
            encode_request(&many),
            Err(ChatError::TooManyMessages { max: MAX_MESSAGES })
        ));

        let long = [
            ChatMessage::user("oi"),
            ChatMessage::user("a".repeat(MAX_MESSAGE_CHARS + 1)),
        ];
        assert!(matches!(
            encode_request(&long),
            Err(ChatError::MessageTooLong { index: 1, .. })
        ));

        let at_limit = vec![ChatMessage::user("a".repeat(MAX_MESSAGE_CHARS)); 6];
        assert!(matches!(
            encode_request(&at_limit),
            Err(ChatError::PayloadTooLarge)
        ));
    }

    #[test]
    fn test_reply_fallback_fields() {
        let reply: ChatReply = serde_json::from_str(r#"{"response":"Olá!"}"#).unwrap();
        assert_eq!(reply.text().as_deref(), Some("Olá!"));

        let empty: ChatReply = serde_json::from_str(r#"{"message":"  "}"#).unwrap();
        assert_eq!(empty.text(), None);
    }

    #[test]
    fn test_debug_shows_endpoint() {
        let client =
            ChatClient::new(Url::parse("https://chat.example.com/api/chat").unwrap()).unwrap();
        assert!(format!("{client:?}").contains("chat.example.com"));
    }

    #[tokio::test]
    async fn test_truncated_error_body_is_an_http_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use vitrine_core::{Email, UserId, UserRole};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0_u8; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            // Promise 200 bytes, send 8, then hang up.
            let head = b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 200\r\n\r\n";
            socket.write_all(head).await.unwrap();
            socket.write_all(br#"{"respon"#).await.unwrap();
            let _ = socket.shutdown().await;
        });

        let client = ChatClient::new(Url::parse(&format!("http://{addr}/chat")).unwrap()).unwrap();
        let session = Session {
            user_id: UserId::generate(),
            email: Email::parse("ana@example.com").unwrap(),
            display_name: "Ana".to_string(),
            role: UserRole::Customer,
            access_token: "token".to_string(),
        };

        let result = client.send(&session, &[ChatMessage::user("Oi")]).await;
        assert!(matches!(result, Err(ChatError::Http(_))), "{result:?}");
        server.await.unwrap();
    }
}
