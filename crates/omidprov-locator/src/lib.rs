//! Provenance locator for OMID-partitioned RDF dumps.
//!
//! OpenCitations-style dumps shard every entity's provenance graph into a
//! fixed directory tree:
//!
//! ```text
//! <root>/<supplier prefix>/<outer bucket>/<inner bucket>/prov/se.zip  (se.json)
//! ```
//!
//! Given an entity IRI, this crate computes that path from the IRI alone
//! (three bounded directory listings, never a walk of the dataset), then
//! streams the single JSON entry of the container to pull out the record
//! whose `@id` is `<entity IRI>/prov/`.
//!
//! ```text
//! IRI ──decompose──► (prefix, n) ──resolve──► leaf dir ──extract──► record
//! ```
//!
//! Everything is synchronous, read-only and stateless; a [`Locator`] can be
//! shared freely across threads. Caching is opt-in via [`CachedLocator`].

pub mod cache;
pub mod config;
pub mod container;
pub mod error;
pub mod omid;
pub mod record;
pub mod resolve;

pub use cache::CachedLocator;
pub use config::{BucketBoundary, ConfigError, LocatorConfig, PartitionRule};
pub use error::{BucketLevel, LocateError, Result};
pub use omid::Omid;
pub use record::ProvenanceRecord;

use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// A dataset root plus the rules for navigating it.
#[derive(Debug, Clone)]
pub struct Locator {
    root: PathBuf,
    config: LocatorConfig,
}

impl Locator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_config(root, LocatorConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: LocatorConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn decompose(&self, identifier: &str) -> Result<Omid> {
        omid::decompose_with(identifier, &self.config.partition)
    }

    /// Leaf bucket directory for `identifier`.
    pub fn locate(&self, identifier: &str) -> Result<PathBuf> {
        let omid = self.decompose(identifier)?;
        resolve::resolve(&omid, &self.root, self.config.boundary)
    }

    /// Path of the provenance container that must hold `identifier`'s record.
    pub fn container_for(&self, identifier: &str) -> Result<PathBuf> {
        let leaf = self.locate(identifier)?;
        Ok(container::container_path(&leaf, &self.config))
    }

    /// Resolve and extract; a miss inside the container is `RecordNotFound`.
    pub fn fetch_provenance(&self, entity_iri: &str) -> Result<ProvenanceRecord> {
        let leaf = self.locate(entity_iri)?;
        match container::extract_record(&leaf, entity_iri, &self.config)? {
            Some(record) => {
                tracing::debug!(entity = entity_iri, record = record.id(), "fetched provenance");
                Ok(record)
            }
            None => Err(LocateError::RecordNotFound {
                record_id: self.config.record_id(entity_iri),
                container: container::container_path(&leaf, &self.config),
            }),
        }
    }

    /// Like [`Locator::fetch_provenance`], with every absence outcome mapped
    /// to `None`. Integrity failures are still errors.
    pub fn find_provenance(&self, entity_iri: &str) -> Result<Option<ProvenanceRecord>> {
        match self.fetch_provenance(entity_iri) {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_absent() => {
                tracing::debug!(entity = entity_iri, reason = %e, "no provenance record");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch several entities in parallel. Results keep the input order.
    pub fn fetch_many<S>(&self, entity_iris: &[S]) -> Vec<Result<ProvenanceRecord>>
    where
        S: AsRef<str> + Sync,
    {
        entity_iris
            .par_iter()
            .map(|iri| self.fetch_provenance(iri.as_ref()))
            .collect()
    }
}

/// [`Locator::locate`] with the default configuration.
pub fn locate(identifier: &str, dataset_root: &Path) -> Result<PathBuf> {
    Locator::new(dataset_root).locate(identifier)
}

/// [`Locator::fetch_provenance`] with the default configuration.
pub fn fetch_provenance(entity_iri: &str, dataset_root: &Path) -> Result<ProvenanceRecord> {
    Locator::new(dataset_root).fetch_provenance(entity_iri)
}

/// [`Locator::find_provenance`] with the default configuration.
pub fn find_provenance(entity_iri: &str, dataset_root: &Path) -> Result<Option<ProvenanceRecord>> {
    Locator::new(dataset_root).find_provenance(entity_iri)
}
