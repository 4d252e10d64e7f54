//! Prefix bindings, passed explicitly to whatever needs them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespaces {
    prefixes: BTreeMap<String, String>,
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::opencitations()
    }
}

impl Namespaces {
    pub fn empty() -> Self {
        Self {
            prefixes: BTreeMap::new(),
        }
    }

    /// Vocabularies used by OpenCitations Meta data and provenance.
    pub fn opencitations() -> Self {
        let mut ns = Self::empty();
        for (prefix, iri) in [
            ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
            ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
            ("xsd", "http://www.w3.org/2001/XMLSchema#"),
            ("prov", "http://www.w3.org/ns/prov#"),
            ("dcterms", "http://purl.org/dc/terms/"),
            ("oco", "https://w3id.org/oc/ontology/"),
            ("fabio", "http://purl.org/spar/fabio/"),
            ("datacite", "http://purl.org/spar/datacite/"),
            ("literal", "http://www.essepuntato.it/2010/06/literalreification/"),
            ("frbr", "http://purl.org/vocab/frbr/core#"),
            ("pro", "http://purl.org/spar/pro/"),
            ("prism", "http://prismstandard.org/namespaces/basic/2.0/"),
            ("foaf", "http://xmlns.com/foaf/0.1/"),
        ] {
            ns.bind(prefix, iri);
        }
        ns
    }

    pub fn bind(&mut self, prefix: impl Into<String>, iri: impl Into<String>) -> &mut Self {
        self.prefixes.insert(prefix.into(), iri.into());
        self
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, i)| (p.as_str(), i.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// `prov:Entity` → full IRI, if the prefix is bound.
    pub fn expand(&self, curie: &str) -> Option<String> {
        let (prefix, local) = curie.split_once(':')?;
        self.get(prefix).map(|ns| format!("{ns}{local}"))
    }

    /// Longest bound namespace that turns `iri` into a valid prefixed name.
    pub fn compact<'a>(&'a self, iri: &'a str) -> Option<(&'a str, &'a str)> {
        self.prefixes
            .iter()
            .filter_map(|(prefix, ns)| {
                let local = iri.strip_prefix(ns.as_str())?;
                is_prefixed_local(local).then_some((prefix.as_str(), ns.len(), local))
            })
            .max_by_key(|(_, ns_len, _)| *ns_len)
            .map(|(prefix, _, local)| (prefix, local))
    }
}

/// Conservative subset of Turtle's `PN_LOCAL` that needs no escaping.
pub fn is_prefixed_local(local: &str) -> bool {
    let Some(first) = local.chars().next() else {
        return true;
    };
    if first == '-' || first == '.' || local.ends_with('.') {
        return false;
    }
    local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_and_compact() {
        let ns = Namespaces::opencitations();
        assert_eq!(
            ns.expand("prov:hadPrimarySource").as_deref(),
            Some("http://www.w3.org/ns/prov#hadPrimarySource")
        );
        assert_eq!(ns.expand("nope:x"), None);
        assert_eq!(
            ns.compact("http://www.w3.org/ns/prov#Entity"),
            Some(("prov", "Entity"))
        );
    }

    #[test]
    fn compact_refuses_locals_needing_escapes() {
        let mut ns = Namespaces::empty();
        ns.bind("meta", "https://w3id.org/oc/meta/");
        assert_eq!(ns.compact("https://w3id.org/oc/meta/br/0601"), None);
        assert_eq!(ns.compact("https://w3id.org/oc/meta/x."), None);
    }

    #[test]
    fn longest_namespace_wins() {
        let mut ns = Namespaces::empty();
        ns.bind("oc", "https://w3id.org/oc/");
        ns.bind("meta", "https://w3id.org/oc/meta/");
        assert_eq!(ns.compact("https://w3id.org/oc/meta/ra"), Some(("meta", "ra")));
    }
}
