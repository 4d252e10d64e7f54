//! Expanded JSON-LD graph records → triples.
//!
//! Provenance dumps store each record in *expanded* form: a `@graph` array of
//! node objects whose keys are absolute IRIs and whose values are arrays of
//! `{"@id": …}` references or `{"@value": …}` literals. Only that shape (plus
//! bare JSON scalars, nested node objects and CURIEs with a bound prefix) is
//! accepted; a record carrying a `@context` would need full JSON-LD
//! processing and is rejected.

use crate::error::{GraphError, Result};
use crate::namespaces::Namespaces;
use crate::term::{
    invalid_iri_char, Literal, Term, Triple, RDF_TYPE, XSD_BOOLEAN, XSD_DOUBLE, XSD_INTEGER,
};
use omidprov_locator::ProvenanceRecord;
use serde_json::{Map, Value};

struct RecordParser<'a> {
    namespaces: &'a Namespaces,
    graph: &'a str,
    /// Prepended to blank node labels so records never share a blank node.
    /// Generated nodes are `{scope}b{k}`, labelled ones `{scope}l_{label}`,
    /// so the two can never collide.
    scope: &'a str,
    next_bnode: usize,
    out: Vec<Triple>,
}

impl RecordParser<'_> {
    fn err(&self, message: impl Into<String>) -> GraphError {
        GraphError::parse(self.graph, message)
    }

    fn fresh_bnode(&mut self) -> Term {
        let id = format!("{}b{}", self.scope, self.next_bnode);
        self.next_bnode += 1;
        Term::BlankNode(id)
    }

    fn node_ref(&self, id: &str) -> Result<Term> {
        if let Some(label) = id.strip_prefix("_:") {
            return labelled_bnode(self.scope, label).ok_or_else(|| {
                self.err(format!("blank node label `{label}` cannot be written back"))
            });
        }
        if !id.contains(':') {
            return Err(self.err(format!("relative IRI `{id}` (no @context support)")));
        }
        self.checked_iri(id.to_string()).map(Term::Iri)
    }

    /// IRIs end up between `<` and `>` in TriG and N-Quads output, so the
    /// characters IRIREF forbids are rejected here.
    fn checked_iri(&self, iri: String) -> Result<String> {
        match invalid_iri_char(&iri) {
            Some(c) => Err(self.err(format!("IRI `{iri}` contains forbidden character {c:?}"))),
            None => Ok(iri),
        }
    }

    fn vocab_iri(&self, key: &str) -> Result<String> {
        if let Some(expanded) = self.namespaces.expand(key) {
            return self.checked_iri(expanded);
        }
        if key.contains(':') {
            return self.checked_iri(key.to_string());
        }
        Err(self.err(format!("relative property or type `{key}` (no @context support)")))
    }

    fn node(&mut self, node: &Map<String, Value>) -> Result<Term> {
        let subject = match node.get("@id") {
            Some(Value::String(id)) => self.node_ref(id)?,
            Some(other) => return Err(self.err(format!("@id must be a string, got {other}"))),
            None => self.fresh_bnode(),
        };

        for (key, value) in node {
            match key.as_str() {
                "@id" | "@index" => {}
                "@type" => {
                    let types: Vec<&Value> = match value {
                        Value::Array(items) => items.iter().collect(),
                        single => vec![single],
                    };
                    for ty in types {
                        let Value::String(ty) = ty else {
                            return Err(self.err(format!("@type entries must be strings, got {ty}")));
                        };
                        let ty = Term::Iri(self.vocab_iri(ty)?);
                        self.out.push(Triple::new(
                            subject.clone(),
                            Term::iri(RDF_TYPE),
                            ty,
                        ));
                    }
                }
                "@context" => {
                    return Err(self.err("compacted JSON-LD (@context) is not supported"));
                }
                keyword if keyword.starts_with('@') => {
                    return Err(self.err(format!("unsupported keyword `{keyword}` in node object")));
                }
                property => {
                    let predicate = Term::Iri(self.vocab_iri(property)?);
                    let values: Vec<&Value> = match value {
                        Value::Array(items) => items.iter().collect(),
                        single => vec![single],
                    };
                    for v in values {
                        if let Some(object) = self.value(v)? {
                            self.out
                                .push(Triple::new(subject.clone(), predicate.clone(), object));
                        }
                    }
                }
            }
        }
        Ok(subject)
    }

    fn value(&mut self, value: &Value) -> Result<Option<Term>> {
        let term = match value {
            Value::Null => return Ok(None),
            Value::String(s) => Term::Literal(Literal::plain(s.clone())),
            Value::Bool(b) => Term::Literal(Literal::typed(b.to_string(), XSD_BOOLEAN)),
            Value::Number(n) => {
                let dt = if n.is_f64() { XSD_DOUBLE } else { XSD_INTEGER };
                Term::Literal(Literal::typed(n.to_string(), dt))
            }
            Value::Array(_) => return Err(self.err("nested arrays are not valid JSON-LD values")),
            Value::Object(obj) => {
                if obj.contains_key("@list") || obj.contains_key("@set") {
                    return Err(self.err("@list/@set values are not supported"));
                }
                if let Some(v) = obj.get("@value") {
                    return self.value_object(v, obj).map(Some);
                }
                let is_bare_ref = obj.keys().all(|k| k == "@id");
                match obj.get("@id") {
                    Some(Value::String(id)) if is_bare_ref => self.node_ref(id)?,
                    _ => self.node(obj)?,
                }
            }
        };
        Ok(Some(term))
    }

    fn value_object(&self, v: &Value, obj: &Map<String, Value>) -> Result<Term> {
        let lexical = match v {
            Value::String(s) => s.clone(),
            Value::Bool(_) | Value::Number(_) => v.to_string(),
            other => return Err(self.err(format!("@value must be a scalar, got {other}"))),
        };
        if let Some(lang) = obj.get("@language") {
            let Value::String(lang) = lang else {
                return Err(self.err("@language must be a string"));
            };
            if !is_language_tag(lang) {
                return Err(self.err(format!("invalid language tag `{lang}`")));
            }
            return Ok(Term::Literal(Literal::lang(lexical, lang.as_str())));
        }
        let datatype = match (obj.get("@type"), v) {
            (Some(Value::String(dt)), _) => Some(self.vocab_iri(dt)?),
            (Some(other), _) => return Err(self.err(format!("@type of a value must be a string, got {other}"))),
            (None, Value::Bool(_)) => Some(XSD_BOOLEAN.to_string()),
            (None, Value::Number(n)) if n.is_f64() => Some(XSD_DOUBLE.to_string()),
            (None, Value::Number(_)) => Some(XSD_INTEGER.to_string()),
            (None, _) => None,
        };
        Ok(Term::Literal(match datatype {
            Some(dt) => Literal::typed(lexical, dt),
            None => Literal::plain(lexical),
        }))
    }
}

/// `[a-zA-Z]+ ('-' [a-zA-Z0-9]+)*`, the LANGTAG production.
fn is_language_tag(tag: &str) -> bool {
    let mut parts = tag.split('-');
    let primary = parts.next().unwrap_or_default();
    !primary.is_empty()
        && primary.chars().all(|c| c.is_ascii_alphabetic())
        && parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Labels are restricted to `[A-Za-z0-9_-]` so they stay valid
/// `BLANK_NODE_LABEL`s once scoped.
fn labelled_bnode(scope: &str, label: &str) -> Option<Term> {
    let valid = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| Term::BlankNode(format!("{scope}l_{label}")))
}

/// Graph name of a record: its `@id` as an IRI (or blank node).
pub fn record_graph_name(record: &ProvenanceRecord, scope: &str) -> Result<Term> {
    let id = record.id();
    if let Some(label) = id.strip_prefix("_:") {
        return labelled_bnode(scope, label)
            .ok_or_else(|| GraphError::parse(id, "blank node label cannot be written back"));
    }
    if !id.contains(':') {
        return Err(GraphError::parse(id, "record @id is not an absolute IRI"));
    }
    if let Some(c) = invalid_iri_char(id) {
        return Err(GraphError::parse(id, format!("record @id contains forbidden character {c:?}")));
    }
    Ok(Term::Iri(id.to_string()))
}

/// Triples of one record's named graph.
///
/// `scope` must be unique per record in an assembly; it is prepended to every
/// blank node label.
pub fn record_triples(
    record: &ProvenanceRecord,
    scope: &str,
    namespaces: &Namespaces,
) -> Result<(Term, Vec<Triple>)> {
    let graph = record_graph_name(record, scope)?;
    let mut parser = RecordParser {
        namespaces,
        graph: record.id(),
        scope,
        next_bnode: 0,
        out: Vec::new(),
    };

    for (key, value) in record.body() {
        match key.as_str() {
            "@graph" => {
                let nodes: Vec<&Value> = match value {
                    Value::Array(nodes) => nodes.iter().collect(),
                    Value::Object(_) => vec![value],
                    other => {
                        return Err(parser.err(format!("@graph must be an array, got {other}")))
                    }
                };
                for node in nodes {
                    let Value::Object(node) = node else {
                        return Err(parser.err(format!("@graph entries must be objects, got {node}")));
                    };
                    parser.node(node)?;
                }
            }
            "@context" => return Err(parser.err("compacted JSON-LD (@context) is not supported")),
            other => {
                tracing::debug!(graph = record.id(), key = other, "ignoring record-level key");
            }
        }
    }

    Ok((graph, parser.out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> ProvenanceRecord {
        serde_json::from_value(v).expect("record")
    }

    const PROV: &str = "http://www.w3.org/ns/prov#";

    #[test]
    fn expanded_snapshot_becomes_triples() {
        let rec = record(json!({
            "@id": "https://w3id.org/oc/meta/br/0601/prov/",
            "@graph": [{
                "@id": "https://w3id.org/oc/meta/br/0601/prov/se/1",
                "@type": ["http://www.w3.org/ns/prov#Entity"],
                "http://www.w3.org/ns/prov#generatedAtTime": [{
                    "@type": "http://www.w3.org/2001/XMLSchema#dateTime",
                    "@value": "2022-12-20T00:00:00+00:00"
                }],
                "http://purl.org/dc/terms/description": [{"@value": "The entity has been created."}],
                "http://www.w3.org/ns/prov#specializationOf": [{"@id": "https://w3id.org/oc/meta/br/0601"}]
            }]
        }));
        let (graph, triples) = record_triples(&rec, "r0_", &Namespaces::default()).unwrap();
        assert_eq!(graph, Term::iri("https://w3id.org/oc/meta/br/0601/prov/"));
        assert_eq!(triples.len(), 4);
        assert!(triples.contains(&Triple::new(
            Term::iri("https://w3id.org/oc/meta/br/0601/prov/se/1"),
            Term::iri(format!("{PROV}specializationOf")),
            Term::iri("https://w3id.org/oc/meta/br/0601"),
        )));
        assert!(triples.iter().any(|t| t.object
            == Term::Literal(Literal::plain("The entity has been created."))));
    }

    #[test]
    fn nested_nodes_and_scalars() {
        let rec = record(json!({
            "@id": "http://example.org/g",
            "@graph": [{
                "@id": "_:a",
                "prov:wasAttributedTo": {"http://xmlns.com/foaf/0.1/name": "Bot"},
                "http://example.org/count": 3,
                "http://example.org/ok": true,
                "http://example.org/label": {"@value": "ciao", "@language": "it"},
                "http://example.org/skip": null
            }]
        }));
        let (_, triples) = record_triples(&rec, "r7_", &Namespaces::default()).unwrap();
        assert_eq!(triples.len(), 5);
        let subject = Term::BlankNode("r7_l_a".to_string());
        assert!(triples.iter().any(|t| t.subject == subject
            && t.predicate == Term::iri(format!("{PROV}wasAttributedTo"))
            && t.object == Term::BlankNode("r7_b0".to_string())));
        assert!(triples
            .iter()
            .any(|t| t.object == Term::Literal(Literal::typed("3", XSD_INTEGER))));
        assert!(triples
            .iter()
            .any(|t| t.object == Term::Literal(Literal::lang("ciao", "it"))));
    }

    #[test]
    fn labelled_and_generated_bnodes_stay_apart() {
        let rec = record(json!({
            "@id": "http://example.org/g",
            "@graph": [
                {"@id": "_:n0", "http://example.org/name": "labelled"},
                {"@id": "_:b0", "http://example.org/name": "also labelled"},
                {
                    "@id": "http://example.org/s",
                    "http://example.org/agent": {"http://example.org/name": "anon"}
                }
            ]
        }));
        let (_, triples) = record_triples(&rec, "r0_", &Namespaces::empty()).unwrap();
        let subjects: std::collections::BTreeSet<&Term> = triples
            .iter()
            .filter(|t| t.predicate == Term::iri("http://example.org/name"))
            .map(|t| &t.subject)
            .collect();
        assert_eq!(subjects.len(), 3);
    }

    #[test]
    fn iris_that_cannot_be_written_are_rejected() {
        let spaced = record(json!({
            "@id": "http://example.org/g",
            "@graph": [{"@id": "http://example.org/a b", "http://example.org/p": "v"}]
        }));
        assert!(matches!(
            record_triples(&spaced, "r_", &Namespaces::empty()),
            Err(GraphError::Parse { .. })
        ));

        let bracket = record(json!({
            "@id": "http://example.org/g",
            "@graph": [{
                "@id": "http://example.org/s",
                "http://example.org/p": [{"@id": "http://example.org/x>y"}]
            }]
        }));
        assert!(record_triples(&bracket, "r_", &Namespaces::empty()).is_err());

        let property = record(json!({
            "@id": "http://example.org/g",
            "@graph": [{"@id": "http://example.org/s", "http://example.org/{p}": "v"}]
        }));
        assert!(record_triples(&property, "r_", &Namespaces::empty()).is_err());

        let graph = record(json!({"@id": "http://example.org/g\"x", "@graph": []}));
        assert!(record_triples(&graph, "r_", &Namespaces::empty()).is_err());

        let lang = record(json!({
            "@id": "http://example.org/g",
            "@graph": [{
                "@id": "http://example.org/s",
                "http://example.org/p": {"@value": "v", "@language": "en US"}
            }]
        }));
        assert!(record_triples(&lang, "r_", &Namespaces::empty()).is_err());

        let label = record(json!({
            "@id": "http://example.org/g",
            "@graph": [{"@id": "_:a b", "http://example.org/p": "v"}]
        }));
        assert!(record_triples(&label, "r_", &Namespaces::empty()).is_err());
    }

    #[test]
    fn malformed_records_fail() {
        let relative = record(json!({"@id": "g:1", "@graph": [{"@id": "x:s", "name": "v"}]}));
        assert!(matches!(
            record_triples(&relative, "r_", &Namespaces::empty()),
            Err(GraphError::Parse { .. })
        ));

        let bad_graph = record(json!({"@id": "g:1", "@graph": "nope"}));
        assert!(record_triples(&bad_graph, "r_", &Namespaces::empty()).is_err());

        let context = record(json!({"@id": "g:1", "@context": {}, "@graph": []}));
        assert!(record_triples(&context, "r_", &Namespaces::empty()).is_err());

        let relative_id = record(json!({"@id": "prov", "@graph": []}));
        assert!(record_triples(&relative_id, "r_", &Namespaces::empty()).is_err());
    }
}
