//! Product search catalog over a RapidAPI-style HTTP endpoint.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use atelier_core::{Catalog, Item, SearchQuery, ToolError, ToolId};

use crate::error::{check_status, RemoteError, RemoteResult};
use crate::USER_AGENT_VALUE;

pub const PRODUCT_SEARCH_SOURCE: &str = "product_search";

/// Connection settings for [`ProductSearchCatalog`].
#[derive(Debug, Clone)]
pub struct ProductSearchConfig {
    pub api_key: String,
    pub host: String,
    /// Defaults to `https://{host}`.
    pub base_url: Option<String>,
    pub country: String,
    pub timeout: Duration,
}

impl ProductSearchConfig {
    pub fn new(api_key: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: host.into(),
            base_url: None,
            country: "US".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct Product {
    asin: Option<String>,
    product_title: Option<String>,
    product_photo: Option<String>,
}

/// [`Catalog`] backed by a product search API.
#[derive(Debug, Clone)]
pub struct ProductSearchCatalog {
    client: reqwest::Client,
    base_url: String,
    host: String,
    api_key: String,
    country: String,
    timeout_ms: u64,
}

impl ProductSearchCatalog {
    pub fn new(config: ProductSearchConfig) -> RemoteResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RemoteError::Client(e.to_string()))?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| format!("https://{}", config.host));

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            host: config.host,
            api_key: config.api_key,
            country: config.country,
            timeout_ms: config.timeout.as_millis() as u64,
        })
    }

    async fn fetch(&self, query: &SearchQuery) -> RemoteResult<Vec<Item>> {
        let url = format!("{}/search", self.base_url);
        debug!(url = %url, query = %query.query, category = %query.category, "product search");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query.query.as_str()),
                ("page", "1"),
                ("country", self.country.as_str()),
            ])
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .send()
            .await?;
        let body: SearchResponse = check_status(response).await?.json().await?;

        let products = body.data.map(|d| d.products).unwrap_or_default();
        Ok(to_items(products, query))
    }
}

/// Drop incomplete products and duplicate ids, keep ranking order, apply the limit.
fn to_items(products: Vec<Product>, query: &SearchQuery) -> Vec<Item> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter_map(|p| match (p.asin, p.product_title, p.product_photo) {
            (Some(id), Some(title), Some(photo))
                if !id.is_empty() && !title.is_empty() && !photo.is_empty() =>
            {
                Some((id, title, photo))
            }
            _ => None,
        })
        .filter(|(id, _, _)| seen.insert(id.clone()))
        .take(query.filters.limit)
        .map(|(id, title, photo)| {
            Item::new(id, title, query.category, photo).with_provenance(PRODUCT_SEARCH_SOURCE)
        })
        .collect()
}

#[async_trait]
impl Catalog for ProductSearchCatalog {
    fn source(&self) -> &str {
        PRODUCT_SEARCH_SOURCE
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Item>, ToolError> {
        self.fetch(query)
            .await
            .map_err(|e| e.into_tool_error(ToolId::SearchCatalog, self.timeout_ms))
    }
}
