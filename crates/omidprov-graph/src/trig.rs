//! TriG / N-Quads output, and reading either back into a [`GraphStore`].
//!
//! Writing is done here (prefix-abbreviated, subjects grouped with `;` and
//! `,`); reading goes through Sophia's Turtle-family parsers.

use crate::error::{GraphError, Result};
use crate::namespaces::Namespaces;
use crate::store::GraphStore;
use crate::term::{escape_literal, Literal, Term, Triple, RDF_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RdfFormat {
    TriG,
    NQuads,
}

impl RdfFormat {
    pub fn name(self) -> &'static str {
        match self {
            RdfFormat::TriG => "TriG",
            RdfFormat::NQuads => "N-Quads",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RdfFormat::TriG => "trig",
            RdfFormat::NQuads => "nq",
        }
    }

    /// `.nq` / `.nquads` are N-Quads; anything else is read as TriG.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("nq") | Some("nquads") => RdfFormat::NQuads,
            _ => RdfFormat::TriG,
        }
    }
}

impl FromStr for RdfFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trig" => Ok(RdfFormat::TriG),
            "nquads" | "n-quads" | "nq" => Ok(RdfFormat::NQuads),
            other => Err(format!("unknown RDF format `{other}` (expected trig or nquads)")),
        }
    }
}

// ============================================================================
// Writing
// ============================================================================

struct TurtleTerms<'a> {
    namespaces: &'a Namespaces,
    used: BTreeSet<&'a str>,
}

impl<'a> TurtleTerms<'a> {
    fn iri(&mut self, iri: &'a str) -> String {
        match self.namespaces.compact(iri) {
            Some((prefix, local)) => {
                self.used.insert(prefix);
                format!("{prefix}:{local}")
            }
            None => format!("<{iri}>"),
        }
    }

    fn literal(&mut self, lit: &'a Literal) -> String {
        let mut out = format!("\"{}\"", escape_literal(&lit.lexical));
        if let Some(lang) = &lit.language {
            out.push('@');
            out.push_str(lang);
        } else if let Some(dt) = &lit.datatype {
            out.push_str("^^");
            out.push_str(&self.iri(dt));
        }
        out
    }

    fn term(&mut self, term: &'a Term) -> String {
        match term {
            Term::Iri(iri) => self.iri(iri),
            Term::BlankNode(id) => format!("_:{id}"),
            Term::Literal(lit) => self.literal(lit),
        }
    }

    fn predicate(&mut self, term: &'a Term) -> String {
        match term {
            Term::Iri(iri) if iri == RDF_TYPE => "a".to_string(),
            other => self.term(other),
        }
    }
}

/// Triples are in subject/predicate order, so grouping is a single pass.
fn write_block<'a, I>(out: &mut String, terms: &mut TurtleTerms<'a>, triples: I, indent: &str)
where
    I: IntoIterator<Item = &'a Triple>,
{
    let mut current: Option<(&Term, &Term)> = None;
    for t in triples {
        match current {
            Some((s, p)) if *s == t.subject && *p == t.predicate => {
                let _ = write!(out, " ,\n{indent}        {}", terms.term(&t.object));
            }
            Some((s, _)) if *s == t.subject => {
                let _ = write!(
                    out,
                    " ;\n{indent}    {} {}",
                    terms.predicate(&t.predicate),
                    terms.term(&t.object)
                );
            }
            prev => {
                if prev.is_some() {
                    out.push_str(" .\n");
                }
                let _ = write!(
                    out,
                    "{indent}{} {} {}",
                    terms.term(&t.subject),
                    terms.predicate(&t.predicate),
                    terms.term(&t.object)
                );
            }
        }
        current = Some((&t.subject, &t.predicate));
    }
    if current.is_some() {
        out.push_str(" .\n");
    }
}

impl GraphStore {
    /// TriG with only the prefixes actually used.
    pub fn to_trig(&self) -> String {
        let mut terms = TurtleTerms {
            namespaces: self.namespaces(),
            used: BTreeSet::new(),
        };
        let mut body = String::new();

        write_block(&mut body, &mut terms, self.default_graph(), "");
        for name in self.named_graphs() {
            if !body.is_empty() {
                body.push('\n');
            }
            let _ = writeln!(body, "{} {{", terms.term(name));
            write_block(&mut body, &mut terms, self.graph(name), "    ");
            body.push_str("}\n");
        }

        let mut out = String::new();
        for prefix in &terms.used {
            if let Some(ns) = self.namespaces().get(prefix) {
                let _ = writeln!(out, "@prefix {prefix}: <{ns}> .");
            }
        }
        if !out.is_empty() && !body.is_empty() {
            out.push('\n');
        }
        out.push_str(&body);
        out
    }

    pub fn to_nquads(&self) -> String {
        let mut out = String::new();
        for quad in self.all_quads() {
            let t = &quad.triple;
            let _ = match &quad.graph {
                Some(g) => writeln!(out, "{} {} {} {g} .", t.subject, t.predicate, t.object),
                None => writeln!(out, "{} {} {} .", t.subject, t.predicate, t.object),
            };
        }
        out
    }

    pub fn serialize(&self, format: RdfFormat) -> String {
        match format {
            RdfFormat::TriG => self.to_trig(),
            RdfFormat::NQuads => self.to_nquads(),
        }
    }

    /// Load TriG or N-Quads text. Prefixes declared in the text are not
    /// retained; `namespaces` is used for later output and queries.
    pub fn from_rdf_text(bytes: &[u8], format: RdfFormat, namespaces: Namespaces) -> Result<Self> {
        let quads = sophia_read::read_quads(bytes, format)
            .map_err(|message| GraphError::parse(format.name(), message))?;
        let store = GraphStore::from_quads(namespaces, quads);
        tracing::debug!(
            format = format.name(),
            quads = store.quad_count(),
            graphs = store.graph_count(),
            "loaded RDF text"
        );
        Ok(store)
    }

    /// Load a TriG or N-Quads file, picking the format from its extension.
    pub fn load_rdf_file(path: &Path, namespaces: Namespaces) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_rdf_text(&bytes, RdfFormat::from_path(path), namespaces)
    }
}

mod sophia_read {
    use super::RdfFormat;
    use crate::term::{self, parse_term_display};
    use sophia::api::prelude::*;

    #[derive(Debug, thiserror::Error)]
    #[error("{message}")]
    struct RdfSinkError {
        message: String,
    }

    fn parse(display: String) -> Result<term::Term, RdfSinkError> {
        parse_term_display(&display).map_err(|message| RdfSinkError { message })
    }

    pub(super) fn read_quads(bytes: &[u8], format: RdfFormat) -> Result<Vec<term::Quad>, String> {
        let cursor = std::io::Cursor::new(bytes);
        let reader = std::io::BufReader::new(cursor);

        let mut out: Vec<term::Quad> = Vec::new();
        let mut push = |s: String,
                        p: String,
                        o: String,
                        g: Option<String>|
         -> Result<(), RdfSinkError> {
            out.push(term::Quad {
                graph: g.map(parse).transpose()?,
                triple: term::Triple::new(parse(s)?, parse(p)?, parse(o)?),
            });
            Ok(())
        };

        match format {
            RdfFormat::TriG => {
                let mut parser = sophia::turtle::parser::trig::parse_bufread(reader);
                parser
                    .try_for_each_quad(|q| {
                        push(
                            q.s().to_string(),
                            q.p().to_string(),
                            q.o().to_string(),
                            q.g().map(|g| g.to_string()),
                        )
                    })
                    .map_err(|e| format!("failed to parse TriG: {e}"))?;
            }
            RdfFormat::NQuads => {
                let mut parser = sophia::turtle::parser::nq::parse_bufread(reader);
                parser
                    .try_for_each_quad(|q| {
                        push(
                            q.s().to_string(),
                            q.p().to_string(),
                            q.o().to_string(),
                            q.g().map(|g| g.to_string()),
                        )
                    })
                    .map_err(|e| format!("failed to parse N-Quads: {e}"))?;
            }
        }
        Ok(out)
    }
}
