// src/retrieve/cache.rs
//! Bounded, time-expiring read-through cache in front of a `SearchIndex`.
//! The only state shared between concurrent scans.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio::time::Instant;

use super::SearchIndex;
use crate::error::SearchError;
use crate::model::CatalogProduct;

type Key = (String, usize);

struct Entry {
    inserted: Instant,
    hits: Vec<CatalogProduct>,
}

pub struct CachedSearchIndex<S> {
    inner: S,
    ttl: Duration,
    capacity: usize,
    entries: RwLock<HashMap<Key, Entry>>,
}

impl<S: SearchIndex> CachedSearchIndex<S> {
    pub fn new(inner: S, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            ttl,
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(query: &str, limit: usize) -> Key {
        (query.trim().to_lowercase(), limit)
    }

    fn lookup(&self, key: &Key, now: Instant) -> Option<Vec<CatalogProduct>> {
        let map = self.entries.read().unwrap_or_else(|p| p.into_inner());
        map.get(key)
            .filter(|e| now.duration_since(e.inserted) < self.ttl)
            .map(|e| e.hits.clone())
    }

    fn store(&self, key: Key, hits: Vec<CatalogProduct>, now: Instant) {
        let mut map = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if !map.contains_key(&key) && map.len() >= self.capacity {
            let ttl = self.ttl;
            map.retain(|_, e| now.duration_since(e.inserted) < ttl);
            if map.len() >= self.capacity {
                let oldest = map
                    .iter()
                    .min_by_key(|(_, e)| e.inserted)
                    .map(|(k, _)| k.clone());
                if let Some(k) = oldest {
                    map.remove(&k);
                }
            }
        }
        map.insert(
            key,
            Entry {
                inserted: now,
                hits,
            },
        );
    }
}

#[async_trait]
impl<S: SearchIndex> SearchIndex for CachedSearchIndex<S> {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogProduct>, SearchError> {
        let key = Self::key(query, limit);
        if let Some(hits) = self.lookup(&key, Instant::now()) {
            counter!("search_cache_total", "result" => "hit").increment(1);
            return Ok(hits);
        }
        counter!("search_cache_total", "result" => "miss").increment(1);

        // errors propagate uncached
        let hits = self.inner.search(query, limit).await?;
        self.store(key, hits.clone(), Instant::now());
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
