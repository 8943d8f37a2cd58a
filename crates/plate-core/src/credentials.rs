//! Third-party API credentials
//!
//! Credentials come either from the local environment or from a running
//! Plate server's key proxy (`GET /api/keys/{name}`). A credential that
//! cannot be obtained is reported as "unavailable" and never retried here;
//! callers that want retries wrap the fetch in a [`RetryPolicy`](crate::retry::RetryPolicy).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// The third-party services Plate needs keys for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Credential {
    /// Text-generation backend
    Generation,
    /// Geocoding and place autocomplete
    Places,
    /// Business directory lookups
    Directory,
}

impl Credential {
    /// Environment variable holding this key
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Generation => "OPENAI_API_KEY",
            Self::Places => "GOOGLE_PLACES_API_KEY",
            Self::Directory => "YELP_API_KEY",
        }
    }

    /// Name used by the key proxy; the directory key is never handed out
    pub fn proxy_name(&self) -> Option<&'static str> {
        match self {
            Self::Generation => Some("openai"),
            Self::Places => Some("google-places"),
            Self::Directory => None,
        }
    }

    pub fn from_proxy_name(name: &str) -> Option<Self> {
        match name {
            "openai" => Some(Self::Generation),
            "google-places" => Some(Self::Places),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Generation => "OpenAI",
            Self::Places => "Google Places",
            Self::Directory => "Yelp",
        }
    }

    /// Message shown to the user when this key is missing
    pub fn missing_message(&self) -> String {
        format!("Please configure your {} API key first", self.display_name())
    }
}

/// Somewhere credentials can be fetched from
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetch a credential, `None` when it is unavailable
    async fn fetch(&self, credential: Credential) -> Option<String>;

    /// Fetch a credential or fail with a "please configure" error
    async fn require(&self, credential: Credential) -> Result<String> {
        self.fetch(credential)
            .await
            .ok_or_else(|| Error::CredentialUnavailable(credential.missing_message()))
    }
}

/// Credentials read from environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

#[async_trait]
impl CredentialSource for EnvCredentials {
    async fn fetch(&self, credential: Credential) -> Option<String> {
        non_empty(std::env::var(credential.env_var()).ok())
    }
}

/// Fixed set of credentials (tests and embedding)
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<Credential, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, credential: Credential, key: &str) -> Self {
        self.keys.insert(credential, key.to_string());
        self
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn fetch(&self, credential: Credential) -> Option<String> {
        non_empty(self.keys.get(&credential).cloned())
    }
}

/// Credentials fetched from a Plate server's key proxy
#[derive(Clone)]
pub struct ProxyCredentials {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct KeyResponse {
    key: Option<String>,
    error: Option<String>,
}

impl ProxyCredentials {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn request(&self, name: &str) -> Result<Option<String>> {
        let response = self
            .http_client
            .get(format!("{}/api/keys/{}", self.base_url, name))
            .send()
            .await?;

        let status = response.status();
        let body: KeyResponse = response.json().await?;

        if !status.is_success() {
            return Err(Error::CredentialUnavailable(
                body.error.unwrap_or_else(|| status.to_string()),
            ));
        }
        Ok(non_empty(body.key))
    }
}

#[async_trait]
impl CredentialSource for ProxyCredentials {
    async fn fetch(&self, credential: Credential) -> Option<String> {
        let name = credential.proxy_name()?;
        match self.request(name).await {
            Ok(key) => {
                debug!(credential = name, found = key.is_some(), "Key proxy responded");
                key
            }
            Err(e) => {
                warn!(credential = name, "Key proxy lookup failed: {}", e);
                None
            }
        }
    }
}

/// Build the credential source selected by the environment
///
/// `PLATE_KEY_PROXY` points at a running server; otherwise keys come from
/// the local environment.
pub fn credentials_from_env() -> Arc<dyn CredentialSource> {
    match non_empty(std::env::var("PLATE_KEY_PROXY").ok()) {
        Some(url) => {
            debug!(url = %url, "Using key proxy for credentials");
            Arc::new(ProxyCredentials::new(&url))
        }
        None => Arc::new(EnvCredentials),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
