//! LLM API key acquisition

use super::KeyPrompt;
use crate::credentials::CredentialStore;
use crate::environment::HostEnvironment;
use crate::error::{AppError, Result};
use secrecy::SecretString;
use tracing::{debug, info, warn};

/// Key stored when no user can be prompted
pub const PLACEHOLDER_KEY: &str = "mock_llm_key";

/// How the key ended up in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    /// A key was already stored; nothing was prompted or written
    AlreadyStored,
    /// Headless host; a placeholder key was written
    PlaceholderStored,
    /// The caller supplied a key and it was written
    Stored,
}

/// Result of starting an acquisition
#[derive(Debug)]
pub enum KeyAcquisition {
    /// Nothing more to do
    Done(KeyStatus),
    /// The caller must supply a key through [`LlmKeyAcquirer::complete`]
    Needed(KeyRequest),
}

/// Signal that the user has to provide an API key
#[derive(Debug)]
pub struct KeyRequest {
    message: &'static str,
}

impl KeyRequest {
    /// Text to show the user
    pub fn message(&self) -> &str {
        self.message
    }
}

/// Ensures an LLM API key is stored, asking for one at most when absent
pub struct LlmKeyAcquirer {
    store: CredentialStore,
    environment: HostEnvironment,
}

impl LlmKeyAcquirer {
    /// Create an acquirer for the given host environment
    pub fn new(store: CredentialStore, environment: HostEnvironment) -> Self {
        Self { store, environment }
    }

    /// Check for a stored key and decide what the caller must do
    pub async fn begin(&self) -> Result<KeyAcquisition> {
        if self.store.llm_key().await?.is_some() {
            debug!("LLM API key already stored");
            return Ok(KeyAcquisition::Done(KeyStatus::AlreadyStored));
        }

        if !self.environment.is_interactive() {
            warn!("LLM API key prompt is not available in a headless environment; storing placeholder key");
            self.store
                .set_llm_key(&SecretString::from(PLACEHOLDER_KEY))
                .await?;
            return Ok(KeyAcquisition::Done(KeyStatus::PlaceholderStored));
        }

        Ok(KeyAcquisition::Needed(KeyRequest {
            message: "Please enter your LLM API key:",
        }))
    }

    /// Store the key the user supplied in answer to `request`
    pub async fn complete(&self, _request: KeyRequest, key: Option<String>) -> Result<KeyStatus> {
        let key = key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::MissingCredential("LLM API key is required".to_string()))?;

        self.store.set_llm_key(&SecretString::from(key)).await?;
        info!("LLM API key stored");
        Ok(KeyStatus::Stored)
    }

    /// Run the whole acquisition, asking `prompt` only if a key is needed
    pub async fn acquire(&self, prompt: &dyn KeyPrompt) -> Result<KeyStatus> {
        match self.begin().await? {
            KeyAcquisition::Done(status) => Ok(status),
            KeyAcquisition::Needed(request) => {
                let key = prompt.request_key(&request).await?;
                self.complete(request, key).await
            }
        }
    }
}
