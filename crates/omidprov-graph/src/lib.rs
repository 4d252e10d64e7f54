//! Provenance graphs built from OMID provenance records.
//!
//! Records fetched by `omidprov-locator` are expanded JSON-LD named graphs.
//! This crate turns them into a [`GraphStore`]:
//!
//! - one named graph per record (named by the record's `@id`),
//! - a union view over all of them, used by triple lookups and queries,
//! - basic graph pattern queries ([`GraphStore::query`]),
//! - TriG / N-Quads output and reading ([`GraphStore::to_trig`],
//!   [`GraphStore::from_rdf_text`]),
//! - snapshot history of an entity ([`history::snapshots`]).
//!
//! Prefixes are carried by a [`Namespaces`] value on each store; there is no
//! process-wide registry.

pub mod error;
pub mod history;
pub mod jsonld;
pub mod namespaces;
pub mod query;
pub mod store;
pub mod term;
pub mod trig;

pub use error::{GraphError, Result};
pub use history::{snapshots, Snapshot};
pub use namespaces::Namespaces;
pub use query::{PatternQuery, QueryResults};
pub use store::{build_graph, AssemblerConfig, GraphAssembler, GraphStore};
pub use term::{Literal, Quad, Term, Triple, TriplePattern};
pub use trig::RdfFormat;
