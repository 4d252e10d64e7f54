//! Shard-tree resolution.
//!
//! Layout consumed (fixed, produced by the publishing pipeline):
//!
//! ```text
//! <root>/<shard prefix>/<outer bucket>/<inner bucket>/prov/se.zip
//! ```
//!
//! Each level is one bounded directory listing; the dataset is never walked.
//! Bucket directories are named by the upper bound of the sequential numbers
//! they hold, so selection is a lower-bound search over the sorted names.

use crate::config::BucketBoundary;
use crate::error::{BucketLevel, LocateError, Result};
use crate::omid::Omid;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A numerically named child directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bucket {
    pub bound: u64,
    pub name: OsString,
}

fn parse_bucket_name(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse::<u64>().ok()
}

/// Numerically named subdirectories of `dir`, sorted by bound.
///
/// Non-numeric entries (e.g. a sibling `prov` directory) and plain files are
/// skipped. The directory handle is dropped before returning.
pub fn list_buckets(dir: &Path) -> Result<Vec<Bucket>> {
    let unreadable = |source| LocateError::DatasetUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let name = entry.file_name();
        let Some(bound) = name.to_str().and_then(parse_bucket_name) else {
            tracing::trace!(dir = %dir.display(), entry = ?name, "skipping non-numeric entry");
            continue;
        };
        if !entry.path().is_dir() {
            continue;
        }
        out.push(Bucket { bound, name });
    }
    out.sort();
    Ok(out)
}

/// Index of the bucket that holds `sequential`, if any.
///
/// `buckets` must be sorted ascending by bound. The admitted region is a
/// suffix of the list, so this is a binary search for its first element.
pub fn select_bucket(buckets: &[Bucket], sequential: u64, boundary: BucketBoundary) -> Option<usize> {
    let idx = buckets.partition_point(|b| !boundary.admits(sequential, b.bound));
    (idx < buckets.len()).then_some(idx)
}

/// Find the shard directory named exactly `prefix` directly under `root`.
pub fn find_shard(root: &Path, prefix: &str) -> Result<PathBuf> {
    let unreadable = |source| LocateError::DatasetUnreadable {
        path: root.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(root).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        if entry.file_name() == prefix && entry.path().is_dir() {
            return Ok(entry.path());
        }
    }
    Err(LocateError::ShardNotFound {
        prefix: prefix.to_string(),
        root: root.to_path_buf(),
    })
}

fn descend(dir: &Path, sequential: u64, boundary: BucketBoundary, level: BucketLevel) -> Result<PathBuf> {
    let buckets = list_buckets(dir)?;
    let Some(idx) = select_bucket(&buckets, sequential, boundary) else {
        return Err(LocateError::RangeNotFound {
            level,
            sequential,
            dir: dir.to_path_buf(),
        });
    };
    let chosen = &buckets[idx];
    tracing::debug!(
        %level,
        bound = chosen.bound,
        candidates = buckets.len(),
        sequential,
        "selected range bucket"
    );
    Ok(dir.join(&chosen.name))
}

/// Resolve the leaf directory holding the entity's provenance container.
pub fn resolve(omid: &Omid, root: &Path, boundary: BucketBoundary) -> Result<PathBuf> {
    let shard = find_shard(root, &omid.prefix)?;
    tracing::debug!(prefix = %omid.prefix, shard = %shard.display(), "found shard");
    let outer = descend(&shard, omid.sequential, boundary, BucketLevel::Outer)?;
    descend(&outer, omid.sequential, boundary, BucketLevel::Inner)
}
