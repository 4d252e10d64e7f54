//! Identifier decomposition.
//!
//! An entity IRI such as `https://w3id.org/oc/meta/br/069301323` ends in a
//! run of digits, the local identifier (OMID). The dataset is sharded on a
//! leading *supplier prefix* of that run; the rest is a sequential number
//! used only for range comparisons.

use crate::config::PartitionRule;
use crate::error::{LocateError, Result};
use std::fmt;

/// A decomposed local identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Omid {
    pub prefix: String,
    pub sequential: u64,
}

impl fmt::Display for Omid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.sequential)
    }
}

/// Trailing maximal run of ASCII digits, if any.
pub fn trailing_digits(identifier: &str) -> Option<&str> {
    let start = identifier
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    Some(&identifier[start..])
}

/// Decompose with the default OpenCitations rule.
pub fn decompose(identifier: &str) -> Result<Omid> {
    decompose_with(identifier, &PartitionRule::FirstZeroAfterLead)
}

pub fn decompose_with(identifier: &str, rule: &PartitionRule) -> Result<Omid> {
    let digits = trailing_digits(identifier)
        .ok_or_else(|| LocateError::malformed(identifier, "no trailing digit run"))?;

    let prefix_len = match rule {
        PartitionRule::FirstZeroAfterLead => {
            let idx = digits
                .bytes()
                .skip(1)
                .position(|b| b == b'0')
                .ok_or_else(|| {
                    LocateError::malformed(identifier, "no shard boundary `0` after the first digit")
                })?;
            idx + 2
        }
        PartitionRule::FixedWidth { width } => {
            if *width == 0 || *width > digits.len() {
                return Err(LocateError::malformed(
                    identifier,
                    format!(
                        "fixed prefix width {width} does not fit {} digits",
                        digits.len()
                    ),
                ));
            }
            *width
        }
    };

    let (prefix, rest) = digits.split_at(prefix_len);
    let sequential = if rest.is_empty() {
        0
    } else {
        rest.parse::<u64>().map_err(|e| {
            LocateError::malformed(identifier, format!("sequential number `{rest}`: {e}"))
        })?
    };

    Ok(Omid {
        prefix: prefix.to_string(),
        sequential,
    })
}
