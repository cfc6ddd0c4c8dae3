// src/retrieve/typesense.rs
//! Typesense search client for the `products` collection.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use super::SearchIndex;
use crate::catalog::normalize_document;
use crate::error::SearchError;
use crate::model::CatalogProduct;

pub const ENV_TYPESENSE_HOST: &str = "TYPESENSE_HOST";
pub const ENV_TYPESENSE_API_KEY: &str = "TYPESENSE_API_KEY";
pub const ENV_TYPESENSE_COLLECTION: &str = "TYPESENSE_COLLECTION";
pub const DEFAULT_COLLECTION: &str = "products";

/// Typesense refuses larger pages.
pub const MAX_PER_PAGE: usize = 250;
pub const QUERY_BY: &str = "name,company,product_type,tags";

pub struct TypesenseIndex {
    http: reqwest::Client,
    host: String,
    api_key: String,
    collection: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    found: u64,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    document: serde_json::Value,
}

impl TypesenseIndex {
    pub fn new(
        host: impl Into<String>,
        api_key: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .user_agent("scan-matcher/0.1")
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            collection: collection.into(),
        })
    }

    /// From TYPESENSE_HOST / TYPESENSE_API_KEY / TYPESENSE_COLLECTION.
    /// `Ok(None)` when no host is configured.
    pub fn from_env() -> Result<Option<Self>, SearchError> {
        let host = std::env::var(ENV_TYPESENSE_HOST).unwrap_or_default();
        if host.trim().is_empty() {
            return Ok(None);
        }
        let api_key = std::env::var(ENV_TYPESENSE_API_KEY).unwrap_or_default();
        let collection = std::env::var(ENV_TYPESENSE_COLLECTION)
            .ok()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        Self::new(host.trim(), api_key, collection).map(Some)
    }

    fn search_url(&self) -> String {
        format!(
            "{}/collections/{}/documents/search",
            self.host, self.collection
        )
    }
}

/// Decode a search response body into normalized catalog products, in hit order.
/// Documents that do not fit the catalog schema are skipped; a page where no
/// document fits is `Malformed`.
pub fn parse_search_response(body: &str) -> Result<Vec<CatalogProduct>, SearchError> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Malformed(e.to_string()))?;
    let total = resp.hits.len();
    let mut out = Vec::with_capacity(total);
    for hit in resp.hits {
        match serde_json::from_value::<CatalogProduct>(hit.document) {
            Ok(doc) => out.push(normalize_document(doc)),
            Err(e) => warn!(error = %e, found = resp.found, "skipping malformed document"),
        }
    }
    if total > 0 && out.is_empty() {
        return Err(SearchError::Malformed(format!(
            "none of {total} documents matched the catalog schema"
        )));
    }
    Ok(out)
}

#[async_trait]
impl SearchIndex for TypesenseIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogProduct>, SearchError> {
        let per_page = limit.clamp(1, MAX_PER_PAGE).to_string();
        let resp = self
            .http
            .get(self.search_url())
            .header("X-TYPESENSE-API-KEY", &self.api_key)
            .query(&[
                ("q", query),
                ("query_by", QUERY_BY),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        parse_search_response(&body)
    }

    fn name(&self) -> &'static str {
        "typesense"
    }
}
