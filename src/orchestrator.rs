//! Answers a user query from one LLM completion and one CRM query

use crate::credentials::CredentialStore;
use crate::crm::CrmClient;
use crate::error::{AppError, Result};
use crate::llm::LlmHandle;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Read query issued alongside every completion
pub const ACCOUNT_QUERY: &str = "SELECT Id, Name FROM Account LIMIT 5";

/// Sequences the LLM and CRM calls and merges their results
pub struct QueryOrchestrator {
    store: CredentialStore,
    llm: Arc<LlmHandle>,
    crm: CrmClient,
}

impl QueryOrchestrator {
    /// Create an orchestrator; `llm` is owned by the caller and may be shared
    pub fn new(store: CredentialStore, llm: Arc<LlmHandle>, crm: CrmClient) -> Self {
        Self { store, llm, crm }
    }

    /// Answer `input`; fails as a whole if either call fails
    #[instrument(skip(self, input))]
    pub async fn process_user_input(&self, input: &str) -> Result<String> {
        let llm = self.llm.client(&self.store).await?;
        let ai_response = llm.chat(input).await?;
        debug!("LLM completion received");

        let credentials = self.store.crm_credentials().await?.ok_or_else(|| {
            AppError::MissingCredential(
                "CRM credentials not found. Please reconnect to the CRM.".to_string(),
            )
        })?;
        let result = self.crm.query(&credentials, ACCOUNT_QUERY).await?;

        Ok(merge_response(&ai_response, result.names()))
    }
}

/// Append the record names to the LLM answer
pub fn merge_response<'a>(ai_response: &str, names: impl Iterator<Item = &'a str>) -> String {
    let names = names.collect::<Vec<_>>().join(", ");
    format!("{ai_response}\n\nHere are some sample CRM accounts:\n{names}")
}
