//! Error types for crm-assist

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    /// The host-provided authorization flow reported a failure
    #[error("Authentication with CRM failed: {0}")]
    AuthFlow(String),

    /// The redirect came back but did not carry the expected credentials
    #[error("Failed to obtain CRM credentials: {0}")]
    CredentialExtraction(String),

    /// An operation needed a credential that is not stored
    #[error("{0}")]
    MissingCredential(String),

    /// The LLM client was requested before an API key was stored
    #[error("LLM API not initialized. Please check your configuration")]
    NotInitialized,

    /// An external service answered with a failure status
    #[error("{service} API error: {message}")]
    ExternalCall {
        /// Which service failed ("llm" or "crm")
        service: &'static str,
        /// Message reported by the service
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to read configuration: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl AppError {
    /// Message suitable for showing to the user, derived from the error kind
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthFlow(_) => "Authentication with CRM failed. Please try connecting again.".to_string(),
            Self::CredentialExtraction(_) => {
                "Failed to obtain CRM credentials. Please try connecting again.".to_string()
            }
            Self::MissingCredential(message) => message.clone(),
            Self::NotInitialized => {
                "LLM API not initialized. Run `crm-assist connect-llm` first.".to_string()
            }
            Self::ExternalCall { service, message } => {
                format!("The {service} service returned an error: {message}")
            }
            Self::RequestError(_) => "Could not reach the remote service.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;
