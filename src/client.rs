use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ChatError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    message: String,
}

/// The remote side of one exchange: takes the user's text, returns the reply text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, endpoint: &str, credential: &str, message: &str) -> Result<String, ChatError>;
}

/// POSTs `{ "message": ... }` with a bearer token and expects the same shape back.
#[derive(Clone)]
pub struct HttpChatClient {
    client: Client,
}

impl HttpChatClient {
    pub fn new(timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChatBackend for HttpChatClient {
    async fn send(&self, endpoint: &str, credential: &str, message: &str) -> Result<String, ChatError> {
        debug!(endpoint, len = message.len(), "sending chat request");

        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", credential))
            .json(&ChatRequest { message })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(%status, body = %snippet(&body), "chat endpoint returned an error status");
            return Err(ChatError::Transport(format!("endpoint returned {}", status)));
        }

        let reply: ChatReply = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, body = %snippet(&body), "chat endpoint returned an unexpected payload");
            ChatError::Payload(e.to_string())
        })?;

        Ok(reply.message)
    }
}

/// First 200 chars of a response body, for logs
fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
