//! Credential acquisition for the CRM and the LLM provider
//!
//! The acquirers never look at the process environment themselves. They are
//! handed an [`AuthHost`] (CRM) or a [`HostEnvironment`] plus a [`KeyPrompt`]
//! (LLM) and branch only on those.

pub mod crm;
pub mod llm;

pub use crm::{parse_redirect, AuthState, CrmOAuthAcquirer};
pub use llm::{KeyAcquisition, KeyRequest, KeyStatus, LlmKeyAcquirer};

use crate::environment::HostEnvironment;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Failure reported by the host while running an authorization flow
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HostError(pub String);

/// A host able to run an interactive web authorization flow
#[async_trait]
pub trait InteractiveAuthHost: Send + Sync {
    /// Open `url`, let the user consent, and resolve with the final redirect URL
    async fn launch_web_auth_flow(
        &self,
        url: &Url,
        interactive: bool,
    ) -> std::result::Result<String, HostError>;
}

/// Supplies an API key once the acquirer signals that one is needed
#[async_trait]
pub trait KeyPrompt: Send + Sync {
    /// Ask for the key; `None` means the user cancelled
    async fn request_key(&self, request: &KeyRequest) -> Result<Option<String>>;
}

/// Authorization capability of the current host
#[derive(Clone)]
pub enum AuthHost {
    /// A real launcher is available
    Interactive(Arc<dyn InteractiveAuthHost>),
    /// No launcher; placeholder credentials are stored instead
    Headless,
}

impl AuthHost {
    /// Pick the capability for an environment, using `launcher` when interactive
    pub fn for_environment(
        environment: HostEnvironment,
        launcher: impl FnOnce() -> Arc<dyn InteractiveAuthHost>,
    ) -> Self {
        match environment {
            HostEnvironment::Interactive => Self::Interactive(launcher()),
            HostEnvironment::Headless => Self::Headless,
        }
    }
}

impl std::fmt::Debug for AuthHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interactive(_) => write!(f, "AuthHost::Interactive"),
            Self::Headless => write!(f, "AuthHost::Headless"),
        }
    }
}
