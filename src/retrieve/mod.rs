// src/retrieve/mod.rs
//! Candidate retrieval: one free-text query built from the scanned product type,
//! sent to a `SearchIndex` under a timeout. Hits are deduplicated by id, truncated
//! to the candidate cap and classified against the taxonomy.

pub mod cache;
pub mod typesense;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::catalog::classify_document;
use crate::config::Taxonomy;
use crate::error::{ScanError, SearchError};
use crate::model::{CatalogProduct, ScanClassification};
use crate::text;

pub use cache::CachedSearchIndex;
pub use typesense::TypesenseIndex;

/// Catalog search ordered by the index's own relevance function.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogProduct>, SearchError>;
    fn name(&self) -> &'static str;
}

pub type DynSearchIndex = Arc<dyn SearchIndex>;

#[derive(Clone)]
pub struct CandidateRetriever {
    index: DynSearchIndex,
    timeout: Duration,
    taxonomy: Arc<Taxonomy>,
}

impl CandidateRetriever {
    pub fn new(index: DynSearchIndex, timeout: Duration) -> Self {
        Self {
            index,
            timeout,
            taxonomy: Arc::new(Taxonomy::default_seed()),
        }
    }

    pub fn with_taxonomy(mut self, taxonomy: Arc<Taxonomy>) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    pub fn index_name(&self) -> &'static str {
        self.index.name()
    }

    pub async fn retrieve(
        &self,
        scan: &ScanClassification,
        cap: usize,
    ) -> Result<Vec<CatalogProduct>, ScanError> {
        let query = scan.product_type.raw.trim();
        if query.is_empty() || cap == 0 {
            debug!("blank query, skipping search");
            return Ok(Vec::new());
        }

        match tokio::time::timeout(self.timeout, self.index.search(query, cap)).await {
            Ok(Ok(mut hits)) => {
                let raw = hits.len();
                let mut seen = HashSet::with_capacity(raw);
                hits.retain(|p| seen.insert(p.id.clone()));
                hits.truncate(cap);
                debug!(
                    index = self.index.name(),
                    hits = hits.len(),
                    duplicates = raw - seen.len(),
                    "retrieved candidates"
                );
                Ok(hits
                    .into_iter()
                    .map(|p| classify_document(p, &self.taxonomy))
                    .collect())
            }
            Ok(Err(e)) => {
                warn!(error = %e, index = self.index.name(), "search failed");
                Err(ScanError::RetrievalFailure(e.to_string()))
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "search timed out");
                Err(ScanError::RetrievalFailure("search timed out".into()))
            }
        }
    }
}

/// Catalog held in memory, ranked by how many query words each product mentions.
/// Used for local runs without a search backend, and in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    products: Vec<CatalogProduct>,
}

impl InMemoryIndex {
    pub fn new(products: Vec<CatalogProduct>) -> Self {
        Self { products }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Load a JSON array of catalog documents.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let docs: Vec<CatalogProduct> = serde_json::from_str(json)
            .map_err(|e| anyhow::anyhow!("Invalid catalog JSON: {}", e))?;
        Ok(Self::new(
            docs.into_iter().map(crate::catalog::normalize_document).collect(),
        ))
    }
}

#[async_trait]
impl SearchIndex for InMemoryIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogProduct>, SearchError> {
        let q = text::meaningful_words(query);
        if q.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(usize, &CatalogProduct)> = self
            .products
            .iter()
            .filter_map(|p| {
                let mut words = text::words(&p.name);
                words.extend(text::words(&p.company));
                words.extend(text::words(&p.product_type));
                for t in &p.tags {
                    words.extend(text::words(t));
                }
                let hits = q.iter().filter(|w| text::has_root(&words, w)).count();
                (hits > 0).then_some((hits, p))
            })
            .collect();
        // stable: equal hit counts keep catalog order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, p)| p.clone())
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
