//! Assembly, querying and serialization of provenance graphs.

use omidprov_graph::{
    build_graph, AssemblerConfig, GraphAssembler, GraphError, GraphStore, Literal, Namespaces,
    RdfFormat, Term, Triple, TriplePattern,
};
use omidprov_locator::ProvenanceRecord;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

const PROV: &str = "http://www.w3.org/ns/prov#";
const META: &str = "https://w3id.org/oc/meta/";

fn snapshot_record(entity: &str, source: Option<&str>) -> ProvenanceRecord {
    let mut node = json!({
        "@id": format!("{META}{entity}/prov/se/1"),
        "@type": [format!("{PROV}Entity")],
        format!("{PROV}generatedAtTime"): [{
            "@type": "http://www.w3.org/2001/XMLSchema#dateTime",
            "@value": "2022-12-20T00:00:00+00:00"
        }],
        format!("{PROV}specializationOf"): [{"@id": format!("{META}{entity}")}],
        format!("{PROV}wasAttributedTo"): [{"@id": "https://orcid.org/0000-0002-8420-0696"}],
        "http://purl.org/dc/terms/description": [{"@value": "The entity has been created.", "@language": "en"}]
    });
    if let Some(source) = source {
        node[format!("{PROV}hadPrimarySource")] = json!([{"@id": source}]);
    }
    serde_json::from_value(json!({
        "@id": format!("{META}{entity}/prov/"),
        "@graph": [node]
    }))
    .expect("record")
}

fn three_records() -> Vec<ProvenanceRecord> {
    vec![
        snapshot_record("br/0601", Some("https://api.crossref.org/")),
        snapshot_record("br/0602", None),
        snapshot_record("ra/0603", Some("https://api.datacite.org/")),
    ]
}

#[test]
fn primary_source_query_spans_named_graphs() {
    let store = build_graph(&three_records()).unwrap();
    assert_eq!(store.graph_count(), 3);

    let results = store
        .query("SELECT ?s ?o WHERE { ?s prov:hadPrimarySource ?o }")
        .unwrap();
    let rows: BTreeSet<(Term, Term)> = results
        .rows
        .iter()
        .map(|row| (row[0].clone().unwrap(), row[1].clone().unwrap()))
        .collect();
    assert_eq!(
        rows,
        BTreeSet::from([
            (
                Term::iri(format!("{META}br/0601/prov/se/1")),
                Term::iri("https://api.crossref.org/")
            ),
            (
                Term::iri(format!("{META}ra/0603/prov/se/1")),
                Term::iri("https://api.datacite.org/")
            ),
        ])
    );

    let by_graph = store
        .query(
            "SELECT ?g WHERE { GRAPH ?g { ?s <http://www.w3.org/ns/prov#hadPrimarySource> ?o } }",
        )
        .unwrap();
    let graphs: Vec<Term> = by_graph
        .column("g")
        .unwrap()
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    assert_eq!(
        graphs,
        vec![
            Term::iri(format!("{META}br/0601/prov/")),
            Term::iri(format!("{META}ra/0603/prov/")),
        ]
    );
}

#[test]
fn shared_triples_appear_once_in_union() {
    let store = build_graph(&three_records()).unwrap();
    let attributed = store.triples(
        &TriplePattern::any()
            .predicate(Term::iri(format!("{PROV}wasAttributedTo"))),
    );
    // Subjects differ, so three distinct triples.
    assert_eq!(attributed.len(), 3);

    let mut store = store;
    let dup = Triple::new(
        Term::iri("https://orcid.org/0000-0002-8420-0696"),
        Term::iri("http://xmlns.com/foaf/0.1/name"),
        Term::iri("https://example.org/curator"),
    );
    for g in store.graph_names() {
        store.insert(Some(g), dup.clone());
    }
    assert_eq!(store.triples(&TriplePattern::any().subject(dup.subject.clone())).len(), 1);
    assert_eq!(store.quads(&TriplePattern::any().subject(dup.subject.clone()), None).len(), 3);
}

#[test]
fn unknown_graph_yields_no_rows() {
    let store = build_graph(&three_records()).unwrap();
    let results = store
        .query("SELECT ?s WHERE { GRAPH <https://w3id.org/oc/meta/br/9999/prov/> { ?s ?p ?o } }")
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn malformed_record_is_a_parse_error_unless_skipped() {
    let bad: ProvenanceRecord = serde_json::from_value(json!({
        "@id": format!("{META}br/0604/prov/"),
        "@graph": [{"@id": "se/1", "description": "no context"}]
    }))
    .unwrap();
    let mut records = three_records();
    records.push(bad);

    assert!(matches!(build_graph(&records), Err(GraphError::Parse { .. })));

    let lenient = GraphAssembler::new(AssemblerConfig {
        skip_invalid_records: true,
        ..AssemblerConfig::default()
    });
    let store = lenient.assemble(&records).unwrap();
    assert_eq!(store.graph_count(), 3);
}

#[test]
fn trig_round_trip_preserves_quads() {
    let store = build_graph(&three_records()).unwrap();
    let trig = store.to_trig();
    assert!(trig.contains("@prefix prov: <http://www.w3.org/ns/prov#> ."));

    let reparsed =
        GraphStore::from_rdf_text(trig.as_bytes(), RdfFormat::TriG, Namespaces::opencitations())
            .unwrap();
    assert_eq!(reparsed, store);
    assert_eq!(reparsed.len(), store.len());
}

#[test]
fn nquads_round_trip_preserves_quads() {
    let store = build_graph(&three_records()).unwrap();
    let nq = store.serialize(RdfFormat::NQuads);
    let reparsed =
        GraphStore::from_rdf_text(nq.as_bytes(), RdfFormat::NQuads, Namespaces::opencitations())
            .unwrap();
    assert_eq!(reparsed, store);
}

/// A snapshot with a labelled blank node, an anonymous nested agent, an
/// update query and literals that need escaping.
fn record_with_blank_nodes(entity: &str, agent: &str) -> ProvenanceRecord {
    serde_json::from_value(json!({
        "@id": format!("{META}{entity}/prov/"),
        "@graph": [
            {
                "@id": format!("{META}{entity}/prov/se/1"),
                format!("{PROV}specializationOf"): [{"@id": format!("{META}{entity}")}],
                format!("{PROV}wasAttributedTo"): [{
                    "http://xmlns.com/foaf/0.1/name": [{"@value": agent}]
                }],
                format!("{PROV}wasDerivedFrom"): [{"@id": "_:draft"}],
                "https://w3id.org/oc/ontology/hasUpdateQuery": [{
                    "@value": format!(
                        "INSERT DATA {{ GRAPH <{META}{entity}/> {{ <{META}{entity}> <http://purl.org/dc/terms/title> \"Über \\\"quoted\\\" titles\"@de . }} }}\n\ttrailing\\path"
                    )
                }],
                "http://purl.org/dc/terms/description": [{
                    "@value": "Café, naïve résumé: \"q\" and \\ and 😀"
                }]
            },
            {
                "@id": "_:draft",
                "http://purl.org/dc/terms/description": [{"@value": "draft\nline two"}]
            }
        ]
    }))
    .expect("record")
}

#[test]
fn trig_round_trip_keeps_blank_nodes_and_escapes() {
    let store = build_graph(&[
        record_with_blank_nodes("br/0610", "alice"),
        record_with_blank_nodes("br/0611", "bob"),
    ])
    .unwrap();
    assert_eq!(
        store
            .triples(&TriplePattern::any().predicate(Term::iri("http://xmlns.com/foaf/0.1/name")))
            .len(),
        2
    );

    let trig = store.to_trig();
    let reparsed =
        GraphStore::from_rdf_text(trig.as_bytes(), RdfFormat::TriG, Namespaces::opencitations())
            .unwrap();
    assert_eq!(reparsed, store);

    let history = omidprov_graph::snapshots(&reparsed, &format!("{META}br/0610"));
    assert_eq!(history.len(), 1);
    let update = history[0].update_query.as_deref().unwrap();
    assert!(update.contains("\"Über \\\"quoted\\\" titles\"@de"));
    assert!(update.ends_with("\n\ttrailing\\path"));
}

#[test]
fn nquads_round_trip_keeps_blank_nodes_and_escapes() {
    let store = build_graph(&[record_with_blank_nodes("br/0610", "alice")]).unwrap();
    let nq = store.to_nquads();
    let reparsed =
        GraphStore::from_rdf_text(nq.as_bytes(), RdfFormat::NQuads, Namespaces::opencitations())
            .unwrap();
    assert_eq!(reparsed, store);
    assert!(reparsed
        .triples(&TriplePattern::any())
        .iter()
        .any(|t| t.object
            == Term::Literal(Literal::plain("Café, naïve résumé: \"q\" and \\ and 😀"))));
}

#[test]
fn loaded_and_assembled_sources_do_not_share_blank_nodes() {
    let exported = build_graph(&[record_with_blank_nodes("br/0610", "alice")])
        .unwrap()
        .to_trig();
    let loaded =
        GraphStore::from_rdf_text(exported.as_bytes(), RdfFormat::TriG, Namespaces::opencitations())
            .unwrap();
    let assembled = build_graph(&[record_with_blank_nodes("br/0611", "bob")]).unwrap();

    let mut merged = GraphStore::new(Namespaces::opencitations());
    merged.extend_from(&loaded);
    merged.extend_from(&assembled);
    assert_eq!(merged.quad_count(), loaded.quad_count() + assembled.quad_count());

    let results = merged
        .query(
            "SELECT ?s ?n WHERE { ?s prov:wasAttributedTo ?x . ?x <http://xmlns.com/foaf/0.1/name> ?n }",
        )
        .unwrap();
    let rows: BTreeSet<(Term, Term)> = results
        .rows
        .iter()
        .map(|row| (row[0].clone().unwrap(), row[1].clone().unwrap()))
        .collect();
    assert_eq!(
        rows,
        BTreeSet::from([
            (
                Term::iri(format!("{META}br/0610/prov/se/1")),
                Term::Literal(Literal::plain("alice"))
            ),
            (
                Term::iri(format!("{META}br/0611/prov/se/1")),
                Term::Literal(Literal::plain("bob"))
            ),
        ])
    );
}

#[test]
fn garbage_rdf_text_is_rejected() {
    let err = GraphStore::from_rdf_text(b"<a> <b> .", RdfFormat::NQuads, Namespaces::empty())
        .unwrap_err();
    assert!(matches!(err, GraphError::Parse { .. }));
}

#[test]
fn history_follows_snapshots() {
    let store = build_graph(&three_records()).unwrap();
    let history = omidprov_graph::snapshots(&store, &format!("{META}br/0601"));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].primary_sources, vec!["https://api.crossref.org/".to_string()]);
    assert_eq!(
        history[0].attributed_to,
        vec!["https://orcid.org/0000-0002-8420-0696".to_string()]
    );
    assert!(history[0].is_current());
}

fn arb_quad() -> impl Strategy<Value = (u8, u8, u8, u8)> {
    (0u8..4, 0u8..5, 0u8..3, 0u8..5)
}

proptest! {
    #[test]
    fn union_view_is_set_union_of_named_graphs(quads in prop::collection::vec(arb_quad(), 0..60)) {
        let mut store = GraphStore::new(Namespaces::empty());
        for (g, s, p, o) in &quads {
            store.insert(
                Some(Term::iri(format!("http://example.org/g{g}"))),
                Triple::new(
                    Term::iri(format!("http://example.org/s{s}")),
                    Term::iri(format!("http://example.org/p{p}")),
                    Term::iri(format!("http://example.org/o{o}")),
                ),
            );
        }

        let union: BTreeSet<Triple> = store
            .graph_names()
            .iter()
            .flat_map(|g| store.graph(g).cloned().collect::<Vec<_>>())
            .collect();
        let view = store.triples(&TriplePattern::any());
        prop_assert_eq!(view.len(), union.len());
        prop_assert_eq!(view.into_iter().collect::<BTreeSet<_>>(), union);

        for p in 0..3u8 {
            let predicate = Term::iri(format!("http://example.org/p{p}"));
            let indexed = store.triples(&TriplePattern::any().predicate(predicate.clone()));
            let scanned: Vec<Triple> = store
                .triples(&TriplePattern::any())
                .into_iter()
                .filter(|t| t.predicate == predicate)
                .collect();
            prop_assert_eq!(indexed.into_iter().collect::<BTreeSet<_>>(), scanned.into_iter().collect::<BTreeSet<_>>());
        }
    }
}
