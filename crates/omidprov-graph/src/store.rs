//! Quad store with a union default view.
//!
//! Every triple lives in exactly one named graph (or the unnamed default
//! graph of loaded RDF text). The union view is the set union of all of them:
//! a triple asserted in two graphs appears there once.
//!
//! Indexes over the union view:
//! - `spo`: triples ordered subject-first (subject-bound lookups),
//! - `pos`: predicate → triples (predicate-bound lookups).

use crate::error::Result;
use crate::jsonld;
use crate::namespaces::Namespaces;
use crate::term::{Quad, Term, Triple, TriplePattern};
use ahash::AHashMap;
use omidprov_locator::ProvenanceRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    pub namespaces: Namespaces,
    /// Log and skip records that fail to parse instead of failing assembly.
    pub skip_invalid_records: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            namespaces: Namespaces::opencitations(),
            skip_invalid_records: false,
        }
    }
}

/// Builds [`GraphStore`]s from provenance records.
#[derive(Debug, Clone, Default)]
pub struct GraphAssembler {
    config: AssemblerConfig,
}

impl GraphAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn assemble<'a, I>(&self, records: I) -> Result<GraphStore>
    where
        I: IntoIterator<Item = &'a ProvenanceRecord>,
    {
        let mut store = GraphStore::new(self.config.namespaces.clone());
        for (idx, record) in records.into_iter().enumerate() {
            let scope = format!("r{idx}_");
            match jsonld::record_triples(record, &scope, &self.config.namespaces) {
                Ok((graph, triples)) => {
                    store.add_graph(graph.clone());
                    for triple in triples {
                        store.insert(Some(graph.clone()), triple);
                    }
                }
                Err(e) if self.config.skip_invalid_records => {
                    tracing::warn!(record = record.id(), error = %e, "skipping invalid record");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(
            graphs = store.graph_count(),
            quads = store.quad_count(),
            triples = store.len(),
            "assembled provenance graph"
        );
        Ok(store)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    namespaces: Namespaces,
    graphs: BTreeMap<Term, BTreeSet<Triple>>,
    default_graph: BTreeSet<Triple>,
    spo: BTreeSet<Triple>,
    pos: AHashMap<Term, BTreeSet<Triple>>,
    /// Number of `extend_from` calls so far; names the blank node scope of
    /// each merged source.
    merges: usize,
}

impl PartialEq for GraphStore {
    /// Same quad set (and therefore the same union view).
    fn eq(&self, other: &Self) -> bool {
        self.graphs == other.graphs && self.default_graph == other.default_graph
    }
}

impl GraphStore {
    pub fn new(namespaces: Namespaces) -> Self {
        Self {
            namespaces,
            ..Self::default()
        }
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn namespaces_mut(&mut self) -> &mut Namespaces {
        &mut self.namespaces
    }

    /// Register a (possibly empty) named graph.
    pub fn add_graph(&mut self, name: Term) {
        self.graphs.entry(name).or_default();
    }

    /// Add a quad. Returns `false` when it was already present.
    pub fn insert(&mut self, graph: Option<Term>, triple: Triple) -> bool {
        let added = match graph {
            Some(name) => self.graphs.entry(name).or_default().insert(triple.clone()),
            None => self.default_graph.insert(triple.clone()),
        };
        if added {
            self.pos
                .entry(triple.predicate.clone())
                .or_default()
                .insert(triple.clone());
            self.spo.insert(triple);
        }
        added
    }

    /// Named graph identifiers, sorted.
    pub fn graph_names(&self) -> Vec<Term> {
        self.graphs.keys().cloned().collect()
    }

    pub fn named_graphs(&self) -> impl Iterator<Item = &Term> {
        self.graphs.keys()
    }

    pub fn contains_graph(&self, name: &Term) -> bool {
        self.graphs.contains_key(name)
    }

    pub fn graph_count(&self) -> usize {
        self.graphs.len()
    }

    /// Size of the union view.
    pub fn len(&self) -> usize {
        self.spo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spo.is_empty()
    }

    pub fn quad_count(&self) -> usize {
        self.default_graph.len() + self.graphs.values().map(BTreeSet::len).sum::<usize>()
    }

    /// Triples of one named graph; empty if the graph is unknown.
    pub fn graph(&self, name: &Term) -> impl Iterator<Item = &Triple> {
        self.graphs.get(name).into_iter().flatten()
    }

    pub fn default_graph(&self) -> impl Iterator<Item = &Triple> {
        self.default_graph.iter()
    }

    /// Union-view triples matching `pattern`, in subject order.
    pub fn triples(&self, pattern: &TriplePattern) -> Vec<Triple> {
        if let Some(subject) = &pattern.subject {
            let start = Triple::new(subject.clone(), Term::min_value(), Term::min_value());
            return self
                .spo
                .range((Bound::Included(start), Bound::Unbounded))
                .take_while(|t| t.subject == *subject)
                .filter(|t| pattern.matches(t))
                .cloned()
                .collect();
        }
        if let Some(predicate) = &pattern.predicate {
            return self
                .pos
                .get(predicate)
                .into_iter()
                .flatten()
                .filter(|t| pattern.matches(t))
                .cloned()
                .collect();
        }
        self.spo
            .iter()
            .filter(|t| pattern.matches(t))
            .cloned()
            .collect()
    }

    /// Quads matching `pattern`.
    ///
    /// `graph = None` searches every named graph and the default graph;
    /// `Some(name)` searches only that named graph (empty if unknown).
    pub fn quads(&self, pattern: &TriplePattern, graph: Option<&Term>) -> Vec<Quad> {
        let mut out = Vec::new();
        let mut scan = |name: Option<&Term>, triples: &BTreeSet<Triple>| {
            out.extend(triples.iter().filter(|t| pattern.matches(t)).map(|t| Quad {
                graph: name.cloned(),
                triple: t.clone(),
            }));
        };
        match graph {
            Some(name) => {
                if let Some(triples) = self.graphs.get(name) {
                    scan(Some(name), triples);
                }
            }
            None => {
                scan(None, &self.default_graph);
                for (name, triples) in &self.graphs {
                    scan(Some(name), triples);
                }
            }
        }
        out
    }

    /// Every quad, default graph first, then named graphs in order.
    pub fn all_quads(&self) -> Vec<Quad> {
        self.quads(&TriplePattern::any(), None)
    }

    /// Merge another store's quads into this one (namespaces are unioned,
    /// existing bindings win).
    ///
    /// Blank nodes are local to the store they came from: each merge renames
    /// the incoming ones under a fresh `m{n}_` scope, so two sources never
    /// share a blank node.
    pub fn extend_from(&mut self, other: &GraphStore) {
        for (prefix, iri) in other.namespaces.iter() {
            if self.namespaces.get(prefix).is_none() {
                self.namespaces.bind(prefix, iri);
            }
        }
        self.merges += 1;
        let scope = format!("m{}_", self.merges);
        let rename = |term: &Term| match term {
            Term::BlankNode(id) => Term::BlankNode(format!("{scope}{id}")),
            other => other.clone(),
        };
        for name in other.graphs.keys() {
            self.add_graph(rename(name));
        }
        for quad in other.all_quads() {
            let t = &quad.triple;
            let triple = Triple::new(rename(&t.subject), t.predicate.clone(), rename(&t.object));
            self.insert(quad.graph.as_ref().map(rename), triple);
        }
    }

    /// Build from quads directly.
    pub fn from_quads<I>(namespaces: Namespaces, quads: I) -> Self
    where
        I: IntoIterator<Item = Quad>,
    {
        let mut store = Self::new(namespaces);
        for quad in quads {
            store.insert(quad.graph, quad.triple);
        }
        store
    }
}

/// Assemble `records` with the default configuration.
pub fn build_graph<'a, I>(records: I) -> Result<GraphStore>
where
    I: IntoIterator<Item = &'a ProvenanceRecord>,
{
    GraphAssembler::default().assemble(records)
}
