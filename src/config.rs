//! Configuration management for crm-assist

use crate::error::{AppError, Result};
use dirs::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the host environment is chosen at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    /// Interactive when stdin is a terminal, headless otherwise
    #[default]
    Auto,
    /// Always use the interactive launcher and prompts
    Interactive,
    /// Never prompt; acquirers store placeholder credentials
    Headless,
}

impl std::str::FromStr for EnvironmentMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "interactive" => Ok(Self::Interactive),
            "headless" => Ok(Self::Headless),
            other => Err(AppError::ConfigError(format!(
                "Invalid environment '{other}', expected auto, interactive or headless"
            ))),
        }
    }
}

/// CRM OAuth and query settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Login host of the CRM (authorization endpoint lives below it)
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// OAuth client id of the connected app
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Redirect target registered for the connected app
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// REST API version used for queries
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            client_id: default_client_id(),
            redirect_uri: default_redirect_uri(),
            api_version: default_api_version(),
        }
    }
}

/// LLM provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the API (e.g., "https://api.openai.com" or custom endpoint)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API endpoint path
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Model to use for completions
    #[serde(default = "default_model")]
    pub model: String,

    /// System prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Request timeout in seconds; unset keeps the transport default
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_path: default_api_path(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            timeout_seconds: None,
        }
    }
}

impl LlmConfig {
    /// Get the full API URL
    pub fn api_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.api_path)
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// CRM settings
    #[serde(default)]
    pub crm: CrmConfig,

    /// LLM settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Directory holding the credential store; defaults to the user data dir
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// Host environment selection
    #[serde(default)]
    pub environment: EnvironmentMode,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Load configuration from config file and environment
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_from_file().await.unwrap_or_default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override settings from `CRM_ASSIST_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(client_id) = std::env::var("CRM_ASSIST_CLIENT_ID") {
            self.crm.client_id = client_id;
        }

        if let Ok(redirect_uri) = std::env::var("CRM_ASSIST_REDIRECT_URI") {
            self.crm.redirect_uri = redirect_uri;
        }

        if let Ok(login_url) = std::env::var("CRM_ASSIST_LOGIN_URL") {
            self.crm.login_url = login_url;
        }

        if let Ok(base_url) = std::env::var("CRM_ASSIST_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }

        if let Ok(model) = std::env::var("CRM_ASSIST_MODEL") {
            self.llm.model = model;
        }

        if let Ok(dir) = std::env::var("CRM_ASSIST_STORAGE_DIR") {
            self.storage_dir = Some(PathBuf::from(dir));
        }

        if let Ok(environment) = std::env::var("CRM_ASSIST_ENVIRONMENT") {
            self.environment = environment.parse()?;
        }

        Ok(())
    }

    /// Load configuration from file
    async fn load_from_file() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&config_path).await?;
        Self::from_toml(&content)
    }

    /// Parse a configuration document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AppError::ConfigError(e.to_string()))
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::ConfigError(e.to_string()))?;

        tokio::fs::write(&config_path, content).await?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let mut path = config_dir()
            .ok_or_else(|| AppError::ConfigError("Could not find config directory".to_string()))?;
        path.push("crm-assist");
        path.push("config.toml");
        Ok(path)
    }

    /// Directory the credential store lives in
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage_dir {
            return Ok(dir.clone());
        }

        let mut path = data_dir()
            .ok_or_else(|| AppError::ConfigError("Could not find data directory".to_string()))?;
        path.push("crm-assist");
        Ok(path)
    }
}

fn default_login_url() -> String {
    "https://login.salesforce.com".to_string()
}

fn default_client_id() -> String {
    "YOUR_CLIENT_ID".to_string()
}

fn default_redirect_uri() -> String {
    "https://localhost/oauth/callback".to_string()
}

fn default_api_version() -> String {
    "v55.0".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_api_path() -> String {
    "/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant that can interact with CRM data.".to_string()
}
