//! CRM REST query client

use crate::credentials::CrmCredentials;
use crate::error::{AppError, Result};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

/// A single record from a query result
#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    /// Record name, when the query selected it
    #[serde(rename = "Name", default)]
    pub name: Option<String>,

    /// Every other field, untyped
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Body of a query response
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResult {
    /// Total number of matching records, when reported
    #[serde(rename = "totalSize", default)]
    pub total_size: Option<u64>,
    /// Records returned in this response
    #[serde(default)]
    pub records: Vec<Record>,
}

impl QueryResult {
    /// Names of the returned records, skipping records without one
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| r.name.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    message: String,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

/// Client for the CRM query endpoint
pub struct CrmClient {
    client: Client,
    api_version: String,
}

impl CrmClient {
    /// Create a client targeting the given REST API version
    pub fn new(api_version: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            api_version: api_version.into(),
        })
    }

    /// Query endpoint URL for an instance, with the SOQL encoded into `q`
    pub fn query_url(&self, instance_url: &str, soql: &str) -> Result<Url> {
        let endpoint = format!(
            "{}/services/data/{}/query",
            instance_url.trim_end_matches('/'),
            self.api_version
        );

        Url::parse_with_params(&endpoint, &[("q", soql)]).map_err(|e| AppError::ExternalCall {
            service: "crm",
            message: format!("invalid instance URL '{instance_url}': {e}"),
        })
    }

    /// Run a read query with the given credentials
    #[instrument(skip(self, credentials), fields(instance_url = %credentials.instance_url))]
    pub async fn query(&self, credentials: &CrmCredentials, soql: &str) -> Result<QueryResult> {
        let url = self.query_url(&credentials.instance_url, soql)?;

        debug!("Sending CRM query");

        let response = self
            .client
            .get(url)
            .bearer_auth(credentials.access_token.expose_secret())
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await?;

            let message = match serde_json::from_str::<Vec<ErrorEntry>>(&error_text) {
                Ok(entries) if !entries.is_empty() => entries
                    .into_iter()
                    .map(|e| match e.error_code {
                        Some(code) => format!("{code}: {}", e.message),
                        None => e.message,
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
                _ => format!("request failed with status {status}: {error_text}"),
            };

            return Err(AppError::ExternalCall {
                service: "crm",
                message,
            });
        }

        let result: QueryResult = response.json().await?;
        debug!(records = result.records.len(), "CRM query returned");
        Ok(result)
    }
}
