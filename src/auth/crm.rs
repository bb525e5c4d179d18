//! CRM OAuth implicit-grant flow

use super::AuthHost;
use crate::config::CrmConfig;
use crate::credentials::{CredentialStore, CrmCredentials};
use crate::error::{AppError, Result};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Token stored when no authorization launcher exists
pub const PLACEHOLDER_TOKEN: &str = "mock_crm_token";

/// Instance URL stored when no authorization launcher exists
pub const PLACEHOLDER_INSTANCE_URL: &str = "https://mock.salesforce.com";

/// Progress of the authorization flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing attempted yet
    Idle,
    /// Waiting for the host to hand back the redirect
    AwaitingRedirect,
    /// Credentials were stored
    Authenticated,
    /// The last attempt failed; call `connect` again to retry
    Failed,
}

/// Drives the CRM authorization and stores the resulting credentials
pub struct CrmOAuthAcquirer {
    config: CrmConfig,
    store: CredentialStore,
    host: AuthHost,
    state: watch::Sender<AuthState>,
}

impl CrmOAuthAcquirer {
    /// Create an acquirer for the given host capability
    pub fn new(config: CrmConfig, store: CredentialStore, host: AuthHost) -> Self {
        let (state, _) = watch::channel(AuthState::Idle);
        Self {
            config,
            store,
            host,
            state,
        }
    }

    /// Current flow state
    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Authorization URL requesting an implicit grant
    pub fn authorization_url(&self) -> Result<Url> {
        let endpoint = format!(
            "{}/services/oauth2/authorize",
            self.config.login_url.trim_end_matches('/')
        );

        Url::parse_with_params(
            &endpoint,
            &[
                ("response_type", "token"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ],
        )
        .map_err(|e| AppError::ConfigError(format!("Invalid CRM login URL: {e}")))
    }

    /// Run the flow once and store the credentials it yields
    #[instrument(skip(self), fields(host = ?self.host))]
    pub async fn connect(&self) -> Result<CrmCredentials> {
        let host = match &self.host {
            AuthHost::Interactive(host) => host,
            AuthHost::Headless => {
                warn!("CRM OAuth is not available in a headless environment; storing placeholder credentials");
                let credentials = CrmCredentials::new(PLACEHOLDER_TOKEN, PLACEHOLDER_INSTANCE_URL);
                self.store.set_crm_credentials(&credentials).await?;
                self.state.send_replace(AuthState::Authenticated);
                return Ok(credentials);
            }
        };

        let url = self.authorization_url()?;
        self.state.send_replace(AuthState::AwaitingRedirect);
        debug!("Launching CRM authorization flow");

        let result = match host.launch_web_auth_flow(&url, true).await {
            Ok(redirect) => self.finish(&redirect).await,
            Err(e) => Err(AppError::AuthFlow(e.to_string())),
        };

        match &result {
            Ok(credentials) => {
                info!(instance_url = %credentials.instance_url, "Connected to CRM");
                self.state.send_replace(AuthState::Authenticated);
            }
            Err(e) => {
                warn!(error = %e, "CRM authorization failed");
                self.state.send_replace(AuthState::Failed);
            }
        }

        result
    }

    async fn finish(&self, redirect: &str) -> Result<CrmCredentials> {
        let credentials = parse_redirect(redirect)?;
        self.store.set_crm_credentials(&credentials).await?;
        Ok(credentials)
    }
}

/// Extract the access token and instance URL from an implicit-grant redirect
///
/// The parameters travel in the URL fragment, not the query string.
pub fn parse_redirect(redirect: &str) -> Result<CrmCredentials> {
    let url = Url::parse(redirect)
        .map_err(|e| AppError::CredentialExtraction(format!("invalid redirect URL: {e}")))?;

    let mut access_token = None;
    let mut instance_url = None;

    for (name, value) in url::form_urlencoded::parse(url.fragment().unwrap_or("").as_bytes()) {
        match name.as_ref() {
            "access_token" if access_token.is_none() => access_token = Some(value.into_owned()),
            "instance_url" if instance_url.is_none() => instance_url = Some(value.into_owned()),
            _ => {}
        }
    }

    match (
        access_token.filter(|v| !v.is_empty()),
        instance_url.filter(|v| !v.is_empty()),
    ) {
        (Some(token), Some(instance_url)) => Ok(CrmCredentials::new(token, instance_url)),
        (None, _) => Err(AppError::CredentialExtraction(
            "access_token missing from redirect".to_string(),
        )),
        (_, None) => Err(AppError::CredentialExtraction(
            "instance_url missing from redirect".to_string(),
        )),
    }
}
