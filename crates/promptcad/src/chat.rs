//! Chat collaborator boundary: request/response shapes and the HTTP client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::session::{Message, Role};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed chat response: {0}")]
    MalformedBody(String),

    #[error("chat collaborator unavailable: {0}")]
    Unavailable(String),
}

/// One prior turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// "user" for user turns; anything else is treated as the assistant
    pub sender: String,
    pub text: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        let sender = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self {
            sender: sender.to_string(),
            text: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ChatTurn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(alias = "responseMessage")]
    response: String,
}

/// Text-generation collaborator. Returns the raw reply text.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<String, ChatError>;
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/chat".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// POSTs [`ChatRequest`] JSON and reads `{"response": "..."}` back.
pub struct HttpChatClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpChatClient {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn send(&self, request: &ChatRequest) -> Result<String, ChatError> {
        debug!(
            "POST {} ({} history turns, {} chars)",
            self.endpoint,
            request.history.len(),
            request.message.len()
        );
        let resp = self.http.post(&self.endpoint).json(request).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_response_body(&body)
    }
}

pub(crate) fn parse_response_body(body: &str) -> Result<String, ChatError> {
    serde_json::from_str::<ChatResponse>(body)
        .map(|parsed| parsed.response)
        .map_err(|e| ChatError::MalformedBody(e.to_string()))
}
