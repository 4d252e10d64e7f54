//! Opt-in record cache layered over a [`Locator`].
//!
//! The locator itself is stateless. This wrapper owns a bounded
//! [`moka::sync::Cache`] and is the only thing that ever invalidates it; the
//! dataset is static, so entries only go stale when the caller swaps the
//! dataset underneath.

use crate::error::Result;
use crate::record::ProvenanceRecord;
use crate::Locator;
use moka::sync::Cache;
use std::sync::Arc;

pub struct CachedLocator {
    inner: Locator,
    cache: Cache<String, Arc<ProvenanceRecord>>,
}

impl CachedLocator {
    /// `capacity` is the maximum number of cached records (at least 1).
    pub fn new(inner: Locator, capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(capacity.max(1)).build();
        Self { inner, cache }
    }

    pub fn locator(&self) -> &Locator {
        &self.inner
    }

    /// Fetch through the cache. Failed lookups are never cached.
    pub fn fetch_provenance(&self, entity_iri: &str) -> Result<Arc<ProvenanceRecord>> {
        if let Some(hit) = self.cache.get(entity_iri) {
            tracing::trace!(entity = entity_iri, "provenance cache hit");
            return Ok(hit);
        }

        let record = Arc::new(self.inner.fetch_provenance(entity_iri)?);
        self.cache
            .insert(entity_iri.to_string(), Arc::clone(&record));
        Ok(record)
    }

    /// Drop one entry. Returns whether it was cached.
    pub fn invalidate(&self, entity_iri: &str) -> bool {
        self.cache.remove(entity_iri).is_some()
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    /// Number of cached records, after applying pending evictions.
    pub fn len(&self) -> usize {
        self.cache.run_pending_tasks();
        self.cache.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
