//! Typed access to the stored credential record

use crate::error::Result;
use crate::storage::Storage;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Storage key of the CRM access token
pub const CRM_TOKEN_KEY: &str = "crmToken";

/// Storage key of the CRM instance URL
pub const CRM_INSTANCE_URL_KEY: &str = "crmInstanceUrl";

/// Storage key of the LLM API key
pub const LLM_API_KEY: &str = "llmApiKey";

/// Credentials obtained from the CRM authorization flow
#[derive(Debug, Clone)]
pub struct CrmCredentials {
    /// Bearer token for CRM API calls
    pub access_token: SecretString,
    /// Base URL of the CRM instance the token belongs to
    pub instance_url: String,
}

impl CrmCredentials {
    /// Build credentials from raw values
    pub fn new(access_token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            instance_url: instance_url.into(),
        }
    }
}

/// Credential accessors layered over [`Storage`]
#[derive(Clone)]
pub struct CredentialStore {
    storage: Storage,
}

impl CredentialStore {
    /// Create a store over the given storage
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Stored CRM credentials, if both the token and the instance URL exist
    pub async fn crm_credentials(&self) -> Result<Option<CrmCredentials>> {
        let mut values = self
            .storage
            .get(&[CRM_TOKEN_KEY, CRM_INSTANCE_URL_KEY])
            .await?;

        match (values.remove(CRM_TOKEN_KEY), values.remove(CRM_INSTANCE_URL_KEY)) {
            (Some(token), Some(instance_url)) => Ok(Some(CrmCredentials::new(token, instance_url))),
            _ => Ok(None),
        }
    }

    /// Stored LLM API key
    pub async fn llm_key(&self) -> Result<Option<SecretString>> {
        let mut values = self.storage.get(&[LLM_API_KEY]).await?;
        Ok(values.remove(LLM_API_KEY).map(SecretString::from))
    }

    /// Store the CRM token and instance URL together
    pub async fn set_crm_credentials(&self, credentials: &CrmCredentials) -> Result<()> {
        self.storage
            .set(&[
                (CRM_TOKEN_KEY, credentials.access_token.expose_secret()),
                (CRM_INSTANCE_URL_KEY, credentials.instance_url.as_str()),
            ])
            .await?;
        debug!(instance_url = %credentials.instance_url, "Stored CRM credentials");
        Ok(())
    }

    /// Store the LLM API key
    pub async fn set_llm_key(&self, key: &SecretString) -> Result<()> {
        self.storage.set(&[(LLM_API_KEY, key.expose_secret())]).await?;
        debug!("Stored LLM API key");
        Ok(())
    }

    /// True when both a CRM token and an LLM key are stored
    pub async fn is_fully_authenticated(&self) -> Result<bool> {
        let values = self.storage.get(&[CRM_TOKEN_KEY, LLM_API_KEY]).await?;
        Ok(values.contains_key(CRM_TOKEN_KEY) && values.contains_key(LLM_API_KEY))
    }

    /// Remove every stored credential
    pub async fn clear(&self) -> Result<()> {
        self.storage
            .remove(&[CRM_TOKEN_KEY, CRM_INSTANCE_URL_KEY, LLM_API_KEY])
            .await
    }
}
