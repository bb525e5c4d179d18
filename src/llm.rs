//! Chat-completion client for an OpenAI-compatible LLM API

use crate::config::LlmConfig;
use crate::credentials::CredentialStore;
use crate::error::{AppError, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation
    System,
    /// The user's own input
    User,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who sent the message
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Message {
    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

/// Provider error response
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// LLM API client bound to one API key
pub struct ChatClient {
    client: Client,
    config: LlmConfig,
    api_key: SecretString,
}

impl ChatClient {
    /// Create a new client
    pub fn new(config: LlmConfig, api_key: SecretString) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }

        Ok(Self {
            client: builder.build()?,
            config,
            api_key,
        })
    }

    /// Model used for completions
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a completion request and return the first choice's content
    #[instrument(skip(self, messages), fields(model = %self.config.model))]
    pub async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
        };

        debug!("Sending completion request");

        let response = self
            .client
            .post(self.config.api_url())
            .bearer_auth(self.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await?;

            let message = serde_json::from_str::<ErrorResponse>(&error_text).map_or_else(
                |_| format!("request failed with status {status}: {error_text}"),
                |e| e.error.message,
            );

            return Err(AppError::ExternalCall {
                service: "llm",
                message,
            });
        }

        let response: CompletionResponse = response.json().await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ExternalCall {
                service: "llm",
                message: "No response choices available".to_string(),
            })?;

        Ok(choice.message.content.unwrap_or_default())
    }

    /// System prompt plus a single user turn
    pub async fn chat(&self, user_input: &str) -> Result<String> {
        let messages = [
            Message::system(&self.config.system_prompt),
            Message::user(user_input),
        ];

        self.complete(&messages).await
    }
}

/// Lazily built, shared [`ChatClient`]
///
/// Concurrent first callers wait on a single construction. A failed
/// construction leaves the handle empty so a later call can retry it.
pub struct LlmHandle {
    config: LlmConfig,
    client: OnceCell<ChatClient>,
}

impl LlmHandle {
    /// Create an empty handle
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    /// Whether the client has been built
    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// Get the client, building it from the stored API key on first use
    pub async fn client(&self, store: &CredentialStore) -> Result<&ChatClient> {
        self.client
            .get_or_try_init(|| async {
                let api_key = store.llm_key().await?.ok_or(AppError::NotInitialized)?;
                let client = ChatClient::new(self.config.clone(), api_key)?;
                info!(model = %client.model(), "LLM client initialized");
                Ok::<_, AppError>(client)
            })
            .await
    }
}
