//! Locator configuration.
//!
//! Everything dataset-specific lives here: how a local identifier is split
//! into a shard prefix and a sequential number, how a number is matched
//! against range bucket names, and the fixed names of the provenance
//! container inside a leaf directory.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// How the trailing digit run of an identifier is split into
/// `(shard prefix, sequential number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PartitionRule {
    /// Prefix runs up to and including the first `0` found at index >= 1.
    ///
    /// This is the OpenCitations Meta supplier-prefix convention
    /// (`060`, `0610`, `06930`, ...).
    FirstZeroAfterLead,
    /// Prefix is exactly the first `width` digits.
    FixedWidth { width: usize },
}

impl Default for PartitionRule {
    fn default() -> Self {
        PartitionRule::FirstZeroAfterLead
    }
}

/// Which bucket a sequential number equal to a bucket name falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketBoundary {
    /// Bucket `N` holds `(N_prev, N]`: pick the smallest `N` with `n <= N`.
    #[default]
    Inclusive,
    /// Bucket `N` holds `[N_prev, N)`: pick the smallest `N` with `n < N`.
    Exclusive,
}

impl BucketBoundary {
    /// Does `sequential` fall at or below the upper bound `bucket`?
    pub fn admits(self, sequential: u64, bucket: u64) -> bool {
        match self {
            BucketBoundary::Inclusive => sequential <= bucket,
            BucketBoundary::Exclusive => sequential < bucket,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub partition: PartitionRule,
    pub boundary: BucketBoundary,
    /// Subdirectory of a leaf bucket that holds the container.
    pub prov_dir: String,
    /// Container archive file name.
    pub container_name: String,
    /// The single structured-record entry inside the container.
    pub entry_name: String,
    /// Appended to an entity IRI to form its provenance record id.
    pub prov_suffix: String,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            partition: PartitionRule::default(),
            boundary: BucketBoundary::default(),
            prov_dir: "prov".to_string(),
            container_name: "se.zip".to_string(),
            entry_name: "se.json".to_string(),
            prov_suffix: "/prov/".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LocatorConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Record id (`@id`) of the provenance graph of `entity_iri`.
    pub fn record_id(&self, entity_iri: &str) -> String {
        format!("{entity_iri}{}", self.prov_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: LocatorConfig =
            serde_json::from_str(r#"{"boundary": "exclusive"}"#).expect("config");
        assert_eq!(cfg.boundary, BucketBoundary::Exclusive);
        assert_eq!(cfg.partition, PartitionRule::FirstZeroAfterLead);
        assert_eq!(cfg.container_name, "se.zip");
    }

    #[test]
    fn fixed_width_rule_is_tagged() {
        let cfg: LocatorConfig =
            serde_json::from_str(r#"{"partition": {"rule": "fixed_width", "width": 4}}"#)
                .expect("config");
        assert_eq!(cfg.partition, PartitionRule::FixedWidth { width: 4 });
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("locator.json");
        std::fs::write(&path, r#"{"entry_name": "prov.json"}"#).expect("write");
        let cfg = LocatorConfig::from_json_file(&path).expect("config");
        assert_eq!(cfg.entry_name, "prov.json");
        assert_eq!(cfg.boundary, BucketBoundary::Inclusive);

        std::fs::write(&path, "{not json").expect("write");
        assert!(matches!(
            LocatorConfig::from_json_file(&path),
            Err(ConfigError::Json { .. })
        ));
        assert!(matches!(
            LocatorConfig::from_json_file(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn boundary_admits_equal_only_when_inclusive() {
        assert!(BucketBoundary::Inclusive.admits(1000, 1000));
        assert!(!BucketBoundary::Exclusive.admits(1000, 1000));
        assert!(BucketBoundary::Exclusive.admits(999, 1000));
    }
}
