//! Access to the remote fetcher script
//!
//! The orchestrator never talks HTTP directly: it goes through a [`RemoteSource`],
//! which makes the remote side replaceable in tests. [`HttpRemoteSource`] is the
//! production implementation that calls the fetcher script installed on a tenant.

use crate::config::FetchConfig;
use crate::error::{CategoryError, Error, Result};
use crate::types::Category;
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Everything needed to address a tenant's fetcher script
///
/// Only built from a tenant record that passed validation, so the URL is known
/// to be an absolute http(s) URL and the key is present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantCredentials {
    /// Base URL of the installation, e.g. `https://online.example.com/Cust1/CS`
    pub base_url: Url,
    /// Include ID of the fetcher script
    pub include_id: String,
    /// Access key of the fetcher script
    pub key: String,
}

impl TenantCredentials {
    /// Build the fetcher script URL with only `category` enabled
    pub fn script_url(&self, category: Category) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/scripts/customer.fcgi", base))
            .map_err(|e| Error::Other(format!("invalid script URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("action", "safeParse")
                .append_pair("includeId", &self.include_id)
                .append_pair("key", &self.key);
            // The script reads every flag, so all six are sent with Python-style booleans
            for candidate in Category::ALL {
                let flag = if candidate == category { "True" } else { "False" };
                query.append_pair(candidate.option_key(), flag);
            }
        }

        Ok(url)
    }
}

/// Decoded response of the fetcher script
#[derive(Clone, Debug, PartialEq)]
pub struct RemotePayload {
    /// Version of the fetcher script that produced the document
    pub script_version: u32,
    /// The whole JSON document
    pub document: Value,
}

impl RemotePayload {
    /// Wrap a decoded document, reading its `script_version`
    ///
    /// Version 1 scripts did not report a version, so a missing, null or zero
    /// value means 1.
    pub fn from_document(document: Value) -> std::result::Result<Self, CategoryError> {
        if !document.is_object() {
            return Err(CategoryError::RemoteFormat(
                "response is not a JSON object".to_string(),
            ));
        }

        let script_version = match document.get("script_version") {
            None | Some(Value::Null) => 1,
            Some(value) => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    CategoryError::RemoteFormat(format!("invalid script_version {}", value))
                })?,
        };

        Ok(Self {
            script_version: script_version.max(1),
            document,
        })
    }
}

/// Source of category payloads
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Retrieve the payload holding one category
    ///
    /// # Errors
    ///
    /// - [`CategoryError::Auth`] if the tenant rejected the credentials
    /// - [`CategoryError::Network`] for transport failures and unexpected HTTP statuses
    /// - [`CategoryError::RemoteFormat`] if the response is not a JSON object
    async fn fetch_category(
        &self,
        credentials: &TenantCredentials,
        category: Category,
    ) -> std::result::Result<RemotePayload, CategoryError>;
}

/// [`RemoteSource`] calling the fetcher script over HTTP(S)
#[derive(Clone, Debug)]
pub struct HttpRemoteSource {
    client: reqwest::Client,
}

impl HttpRemoteSource {
    /// Create a source using the connect timeout and user agent from `config`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch_category(
        &self,
        credentials: &TenantCredentials,
        category: Category,
    ) -> std::result::Result<RemotePayload, CategoryError> {
        let url = credentials
            .script_url(category)
            .map_err(|e| CategoryError::Network(e.to_string()))?;

        // The query string carries the access key, so only the path is logged
        tracing::debug!(
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            category = %category,
            "Requesting category from fetcher script"
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CategoryError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(CategoryError::Auth(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(CategoryError::Network(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CategoryError::Network(e.without_url().to_string()))?;

        let document: Value = serde_json::from_slice(&body)
            .map_err(|e| CategoryError::RemoteFormat(format!("invalid JSON: {}", e)))?;

        RemotePayload::from_document(document)
    }
}
