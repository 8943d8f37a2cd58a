//! Geocoding collaborator
//!
//! Used only to find the county of a restaurant's city for tax resolution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::credentials::{Credential, CredentialSource};
use crate::error::{Error, Result};
use crate::places::AddressComponent;
use crate::retry::RetryPolicy;

pub const GOOGLE_MAPS_BASE_URL: &str = "https://maps.googleapis.com";

/// Resolves a free-form address to its components
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Address components of the best match; empty when nothing matched
    async fn geocode(&self, address: &str) -> Result<Vec<AddressComponent>>;
}

/// Google Geocoding API client
#[derive(Clone)]
pub struct GoogleGeocoder {
    http_client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

impl GoogleGeocoder {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(GOOGLE_MAPS_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Fetch the places key and build a geocoder, retrying per `policy`
    pub async fn connect(
        credentials: &dyn CredentialSource,
        policy: &RetryPolicy,
        base_url: &str,
    ) -> Result<Self> {
        let key = policy
            .run_or_else(
                "places credential",
                |_| credentials.require(Credential::Places),
                |e| error!("Geocoding unavailable, county tax rates disabled: {}", e),
            )
            .await?;
        Ok(Self::with_base_url(base_url, &key))
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<AddressComponent>> {
        let response = self
            .http_client
            .get(format!("{}/maps/api/geocode/json", self.base_url))
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Geocode(format!(
                "geocoding request failed: {}",
                response.status()
            )));
        }

        let body: GeocodeResponse = response.json().await?;
        debug!(address, status = %body.status, results = body.results.len(), "Geocode response");

        match body.status.as_str() {
            "OK" => Ok(body
                .results
                .into_iter()
                .next()
                .map(|r| r.address_components)
                .unwrap_or_default()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            status => Err(Error::Geocode(match body.error_message {
                Some(message) => format!("{}: {}", status, message),
                None => status.to_string(),
            })),
        }
    }
}

/// In-memory geocoder for tests and offline use
#[derive(Clone, Default)]
pub struct MockGeocoder {
    counties: HashMap<String, String>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A geocoder whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Resolve `address` to the given second-level area (e.g. "Cook County")
    pub fn with_county(mut self, address: &str, county: &str) -> Self {
        self.counties.insert(address.to_string(), county.to_string());
        self
    }

    /// Number of geocode calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<AddressComponent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Geocode("mock geocoder failure".into()));
        }
        Ok(self
            .counties
            .get(address)
            .map(|county| {
                vec![AddressComponent {
                    long_name: county.clone(),
                    short_name: county.clone(),
                    types: vec![
                        "administrative_area_level_2".to_string(),
                        "political".to_string(),
                    ],
                }]
            })
            .unwrap_or_default())
    }
}
