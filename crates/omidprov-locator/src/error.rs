//! Typed lookup outcomes.
//!
//! The variants split into two families:
//!
//! - **absence**: the dataset is readable but does not hold the entity
//!   (`ShardNotFound`, `RangeNotFound`, `RecordNotFound`);
//! - **integrity**: the input or the dataset itself is broken
//!   (`MalformedIdentifier`, `DatasetUnreadable`, `ContainerUnreadable`,
//!   `RecordFormatError`).
//!
//! Callers react differently to the two, so neither is ever folded into an
//! empty result.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the two numeric range levels missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketLevel {
    Outer,
    Inner,
}

impl fmt::Display for BucketLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketLevel::Outer => f.write_str("outer"),
            BucketLevel::Inner => f.write_str("inner"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("malformed identifier `{identifier}`: {reason}")]
    MalformedIdentifier { identifier: String, reason: String },

    #[error("dataset directory {} is unreadable", path.display())]
    DatasetUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no shard directory `{prefix}` under {}", root.display())]
    ShardNotFound { prefix: String, root: PathBuf },

    #[error("sequential number {sequential} exceeds every {level} bucket in {}", dir.display())]
    RangeNotFound {
        level: BucketLevel,
        sequential: u64,
        dir: PathBuf,
    },

    #[error("provenance container {} is unreadable", path.display())]
    ContainerUnreadable {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("malformed records in {} (entry `{entry}`)", path.display())]
    RecordFormatError {
        path: PathBuf,
        entry: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no provenance record `{record_id}` in {}", container.display())]
    RecordNotFound {
        record_id: String,
        container: PathBuf,
    },
}

impl LocateError {
    /// True when the dataset was readable but does not contain the entity.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            LocateError::ShardNotFound { .. }
                | LocateError::RangeNotFound { .. }
                | LocateError::RecordNotFound { .. }
        )
    }

    pub(crate) fn malformed(identifier: &str, reason: impl Into<String>) -> Self {
        LocateError::MalformedIdentifier {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LocateError>;
