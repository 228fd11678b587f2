//! Dialogue client
//!
//! Stateless request/response wrapper for the chat endpoint: `POST` a
//! `{ "message" }` body, receive `{ "response" }` or an `{ "error" }` with a
//! non-success status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{DialogueConfig, endpoint_url};
use crate::error::DialogueError;
use crate::Result;

/// A remote capability that answers a message with reply text
#[async_trait]
pub trait DialogueService: Send + Sync {
    /// Request a reply for `text`
    ///
    /// Blank text is rejected with `BlankMessage` before anything is sent.
    async fn request_reply(&self, text: &str) -> std::result::Result<String, DialogueError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// HTTP client for the dialogue server
pub struct DialogueClient {
    client: reqwest::Client,
    chat_url: Url,
    health_url: Url,
}

impl DialogueClient {
    /// Create a client from validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built or the endpoint URLs
    /// cannot be formed
    pub fn new(config: &DialogueConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let chat_url = endpoint_url(&config.base_url, &config.chat_path)?;
        let health_url = endpoint_url(&config.base_url, "health")?;

        tracing::debug!(url = %chat_url, timeout = ?config.timeout, "dialogue client initialized");

        Ok(Self {
            client,
            chat_url,
            health_url,
        })
    }

    /// Check that the dialogue server is reachable and healthy
    ///
    /// # Errors
    ///
    /// Returns `Network` if the server cannot be reached, `BadResponse` if it
    /// does not report `ok`
    pub async fn health_check(&self) -> std::result::Result<(), DialogueError> {
        let response = self
            .client
            .get(self.health_url.clone())
            .send()
            .await
            .map_err(|e| DialogueError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DialogueError::BadResponse(format!("health check returned {status}")));
        }

        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| DialogueError::BadResponse(format!("malformed health body: {e}")))?;

        if health.status == "ok" {
            Ok(())
        } else {
            Err(DialogueError::BadResponse(format!("server status: {}", health.status)))
        }
    }
}

#[async_trait]
impl DialogueService for DialogueClient {
    async fn request_reply(&self, text: &str) -> std::result::Result<String, DialogueError> {
        if text.trim().is_empty() {
            return Err(DialogueError::BlankMessage);
        }
        tracing::debug!(url = %self.chat_url, chars = text.len(), "sending dialogue request");

        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&ChatRequest { message: text })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "dialogue request failed");
                DialogueError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ChatResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            tracing::warn!(status = %status, error = %detail, "dialogue endpoint returned an error");
            return Err(DialogueError::BadResponse(format!("{status}: {detail}")));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "malformed dialogue response");
            DialogueError::BadResponse(format!("malformed body: {e}"))
        })?;

        match body.response {
            Some(reply) if !reply.trim().is_empty() => {
                tracing::info!(chars = reply.len(), "dialogue reply received");
                Ok(reply)
            }
            _ => {
                tracing::warn!("dialogue endpoint returned no reply text");
                Err(DialogueError::EmptyReply)
            }
        }
    }
}
