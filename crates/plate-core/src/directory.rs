//! Business directory collaborator (Yelp Fusion)
//!
//! Lookup runs a three-step chain: exact match on name and address, then a
//! name search around the location, then the details call for the chosen id.
//! No match is not an error; callers simply plan without listing metadata.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::RestaurantSelection;

const YELP_BASE_URL: &str = "https://api.yelp.com/v3";

/// What to look up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessQuery {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default, alias = "state")]
    pub region: String,
}

impl From<&RestaurantSelection> for BusinessQuery {
    fn from(selection: &RestaurantSelection) -> Self {
        Self {
            name: selection.name.clone(),
            address: selection
                .street_address
                .clone()
                .or_else(|| selection.address.clone()),
            city: selection.city.clone(),
            region: selection.region.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessCategory {
    pub title: String,
}

/// Listing metadata used to ground the prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Price tier, e.g. "$$$"
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub categories: Vec<BusinessCategory>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
}

impl BusinessInfo {
    /// Category titles joined with ", ", `None` when there are none
    pub fn category_titles(&self) -> Option<String> {
        (!self.categories.is_empty()).then(|| {
            self.categories
                .iter()
                .map(|c| c.title.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
    }
}

#[async_trait]
pub trait BusinessDirectory: Send + Sync {
    /// Find listing details, `Ok(None)` when nothing matches
    async fn lookup(&self, query: &BusinessQuery) -> Result<Option<BusinessInfo>>;
}

/// Yelp Fusion API client
#[derive(Clone)]
pub struct YelpDirectory {
    http_client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct BusinessList {
    #[serde(default)]
    businesses: Vec<BusinessId>,
}

#[derive(Debug, Deserialize)]
struct BusinessId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct YelpErrorResponse {
    error: YelpError,
}

#[derive(Debug, Deserialize)]
struct YelpError {
    code: Option<String>,
    description: Option<String>,
}

impl YelpDirectory {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(YELP_BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .http_client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<YelpErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.description.or(e.error.code))
                .unwrap_or_else(|| status.to_string());
            return Err(Error::Directory(format!("Yelp API error {}: {}", status, detail)));
        }

        Ok(response.json().await?)
    }

    async fn find_id(&self, query: &BusinessQuery) -> Result<Option<String>> {
        let address = query.address.as_deref().unwrap_or("");

        let matches: BusinessList = self
            .get(
                "/businesses/matches",
                &[
                    ("name", query.name.as_str()),
                    ("address1", address),
                    ("city", query.city.as_str()),
                    ("state", query.region.as_str()),
                    ("country", "US"),
                    ("match_threshold", "default"),
                ],
            )
            .await?;
        if let Some(first) = matches.businesses.into_iter().next() {
            debug!(id = %first.id, "Directory exact match");
            return Ok(Some(first.id));
        }

        let location = [address, query.city.as_str(), query.region.as_str()]
            .iter()
            .filter(|part| !part.trim().is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        let search: BusinessList = self
            .get(
                "/businesses/search",
                &[
                    ("term", query.name.as_str()),
                    ("location", location.as_str()),
                    ("limit", "1"),
                ],
            )
            .await?;
        Ok(search.businesses.into_iter().next().map(|b| b.id))
    }
}

#[async_trait]
impl BusinessDirectory for YelpDirectory {
    async fn lookup(&self, query: &BusinessQuery) -> Result<Option<BusinessInfo>> {
        let Some(id) = self.find_id(query).await? else {
            debug!(name = %query.name, "Restaurant not found in directory");
            return Ok(None);
        };
        let details: BusinessInfo = self.get(&format!("/businesses/{}", id), &[]).await?;
        Ok(Some(details))
    }
}

/// Directory lookups through a Plate server's `/api/business` endpoint
#[derive(Clone)]
pub struct ProxyDirectory {
    http_client: Client,
    base_url: String,
}

impl ProxyDirectory {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BusinessDirectory for ProxyDirectory {
    async fn lookup(&self, query: &BusinessQuery) -> Result<Option<BusinessInfo>> {
        let response = self
            .http_client
            .post(format!("{}/api/business", self.base_url))
            .json(query)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(Error::Directory(format!(
                "Failed to fetch restaurant data: {}",
                status
            ))),
        }
    }
}

/// In-memory directory for tests and offline use
#[derive(Clone, Default)]
pub struct MockDirectory {
    businesses: HashMap<String, BusinessInfo>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Register a business under its (case-insensitive) name
    pub fn with_business(mut self, name: &str, info: BusinessInfo) -> Self {
        self.businesses.insert(name.to_lowercase(), info);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusinessDirectory for MockDirectory {
    async fn lookup(&self, query: &BusinessQuery) -> Result<Option<BusinessInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Directory("mock directory failure".into()));
        }
        Ok(self.businesses.get(&query.name.to_lowercase()).cloned())
    }
}
