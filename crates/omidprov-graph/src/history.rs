//! Change history of an entity, read from its provenance snapshots.
//!
//! Each snapshot is a `prov:Entity` that is a `prov:specializationOf` the
//! tracked entity. Snapshots come back oldest first.

use crate::store::GraphStore;
use crate::term::{Term, TriplePattern};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;

const PROV: &str = "http://www.w3.org/ns/prov#";
const DCTERMS_DESCRIPTION: &str = "http://purl.org/dc/terms/description";
const OCO_HAS_UPDATE_QUERY: &str = "https://w3id.org/oc/ontology/hasUpdateQuery";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub iri: String,
    /// Named graph the snapshot was found in.
    pub graph: Option<String>,
    pub generated_at: Option<DateTime<FixedOffset>>,
    pub invalidated_at: Option<DateTime<FixedOffset>>,
    pub description: Option<String>,
    pub primary_sources: Vec<String>,
    pub attributed_to: Vec<String>,
    pub derived_from: Vec<String>,
    pub update_query: Option<String>,
}

impl Snapshot {
    /// `…/prov/se/3` → 3.
    pub fn number(&self) -> Option<u64> {
        let (head, n) = self.iri.rsplit_once('/')?;
        head.ends_with("/se").then(|| n.parse().ok()).flatten()
    }

    pub fn is_current(&self) -> bool {
        self.invalidated_at.is_none()
    }
}

/// `xsd:dateTime` lexical form; a missing offset is read as UTC.
pub fn parse_timestamp(lexical: &str) -> Option<DateTime<FixedOffset>> {
    let lexical = lexical.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(lexical) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(Utc.from_utc_datetime(&naive).into())
}

fn values(store: &GraphStore, subject: &Term, predicate: &str) -> Vec<Term> {
    store
        .triples(
            &TriplePattern::any()
                .subject(subject.clone())
                .predicate(Term::iri(predicate)),
        )
        .into_iter()
        .map(|t| t.object)
        .collect()
}

fn term_text(term: &Term) -> String {
    match term {
        Term::Iri(iri) => iri.clone(),
        Term::BlankNode(id) => format!("_:{id}"),
        Term::Literal(lit) => lit.lexical.clone(),
    }
}

fn first_text(store: &GraphStore, subject: &Term, predicate: &str) -> Option<String> {
    values(store, subject, predicate).first().map(term_text)
}

fn timestamp(store: &GraphStore, subject: &Term, predicate: &str) -> Option<DateTime<FixedOffset>> {
    let raw = first_text(store, subject, predicate)?;
    let parsed = parse_timestamp(&raw);
    if parsed.is_none() {
        tracing::warn!(snapshot = %subject, value = %raw, "unparseable timestamp");
    }
    parsed
}

/// Snapshots of `entity_iri`, oldest first (undated ones last).
pub fn snapshots(store: &GraphStore, entity_iri: &str) -> Vec<Snapshot> {
    let specialization = TriplePattern::any()
        .predicate(Term::iri(format!("{PROV}specializationOf")))
        .object(Term::iri(entity_iri));

    let mut out: Vec<Snapshot> = Vec::new();
    for quad in store.quads(&specialization, None) {
        let subject = &quad.triple.subject;
        let iri = term_text(subject);
        if out.iter().any(|s| s.iri == iri) {
            continue;
        }
        let texts = |p: &str| values(store, subject, p).iter().map(term_text).collect::<Vec<_>>();
        out.push(Snapshot {
            graph: quad.graph.as_ref().map(term_text),
            generated_at: timestamp(store, subject, &format!("{PROV}generatedAtTime")),
            invalidated_at: timestamp(store, subject, &format!("{PROV}invalidatedAtTime")),
            description: first_text(store, subject, DCTERMS_DESCRIPTION),
            primary_sources: texts(&format!("{PROV}hadPrimarySource")),
            attributed_to: texts(&format!("{PROV}wasAttributedTo")),
            derived_from: texts(&format!("{PROV}wasDerivedFrom")),
            update_query: first_text(store, subject, OCO_HAS_UPDATE_QUERY),
            iri,
        });
    }

    out.sort_by(|a, b| {
        (a.generated_at.is_none(), a.generated_at, a.number(), &a.iri).cmp(&(
            b.generated_at.is_none(),
            b.generated_at,
            b.number(),
            &b.iri,
        ))
    });
    tracing::debug!(entity = entity_iri, snapshots = out.len(), "collected history");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::Namespaces;
    use crate::term::{Literal, Triple};

    const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

    fn add(store: &mut GraphStore, g: &str, s: &str, p: &str, o: Term) {
        store.insert(Some(Term::iri(g)), Triple::new(Term::iri(s), Term::iri(p), o));
    }

    #[test]
    fn snapshots_are_ordered_by_generation_time() {
        let entity = "https://w3id.org/oc/meta/br/0601";
        let g = "https://w3id.org/oc/meta/br/0601/prov/";
        let se1 = "https://w3id.org/oc/meta/br/0601/prov/se/1";
        let se2 = "https://w3id.org/oc/meta/br/0601/prov/se/2";
        let mut store = GraphStore::new(Namespaces::opencitations());
        for (se, generated) in [(se2, "2023-01-01T10:00:00+00:00"), (se1, "2022-12-20T00:00:00")] {
            add(&mut store, g, se, &format!("{PROV}specializationOf"), Term::iri(entity));
            add(
                &mut store,
                g,
                se,
                &format!("{PROV}generatedAtTime"),
                Term::Literal(Literal::typed(generated, XSD_DATETIME)),
            );
        }
        add(
            &mut store,
            g,
            se1,
            &format!("{PROV}invalidatedAtTime"),
            Term::Literal(Literal::typed("2023-01-01T10:00:00+00:00", XSD_DATETIME)),
        );
        add(
            &mut store,
            g,
            se1,
            DCTERMS_DESCRIPTION,
            Term::Literal(Literal::plain("The entity has been created.")),
        );
        add(
            &mut store,
            g,
            se2,
            &format!("{PROV}wasDerivedFrom"),
            Term::iri(se1),
        );

        let history = snapshots(&store, entity);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].iri, se1);
        assert_eq!(history[0].number(), Some(1));
        assert!(!history[0].is_current());
        assert_eq!(
            history[0].description.as_deref(),
            Some("The entity has been created.")
        );
        assert_eq!(history[0].graph.as_deref(), Some(g));
        assert_eq!(history[1].iri, se2);
        assert!(history[1].is_current());
        assert_eq!(history[1].derived_from, vec![se1.to_string()]);

        assert!(snapshots(&store, "https://w3id.org/oc/meta/br/0602").is_empty());
    }

    #[test]
    fn timestamps() {
        assert!(parse_timestamp("2022-12-20T00:00:00+00:00").is_some());
        assert_eq!(
            parse_timestamp("2022-12-20T00:00:00"),
            parse_timestamp("2022-12-20T00:00:00Z")
        );
        assert!(parse_timestamp("2022-12-20T00:00:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
