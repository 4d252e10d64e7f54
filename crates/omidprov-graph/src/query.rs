//! Basic graph pattern queries over a [`GraphStore`].
//!
//! A small SPARQL-shaped surface:
//!
//! ```text
//! PREFIX prov: <http://www.w3.org/ns/prov#>
//! SELECT DISTINCT ?snapshot ?source WHERE {
//!   ?snapshot a prov:Entity ;
//!             prov:hadPrimarySource ?source .
//!   GRAPH ?g { ?snapshot prov:specializationOf <https://w3id.org/oc/meta/br/0601> }
//! } LIMIT 10
//! ```
//!
//! Semantics:
//! - patterns outside `GRAPH` match the union view;
//! - `GRAPH <iri> { … }` matches that named graph only (an unknown graph
//!   simply yields no rows);
//! - `GRAPH ?g { … }` ranges over named graphs and binds `?g`;
//! - the whole `WHERE` block is one conjunction, evaluated by backtracking
//!   search that always extends the pattern with the most bound positions.
//!
//! Prefixes resolve against the store's namespaces first, then any `PREFIX`
//! declarations in the query (which win).

use crate::error::{GraphError, Result};
use crate::namespaces::Namespaces;
use crate::store::GraphStore;
use crate::term::{Literal, Term, Triple, TriplePattern, RDF_TYPE, XSD_BOOLEAN, XSD_INTEGER};
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while, take_while1};
use nom::character::complete::{char as pchar, digit1, multispace1, one_of};
use nom::combinator::{all_consuming, map, map_res, not, opt, peek, recognize, value};
use nom::multi::{many0, many1, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// Query model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    Var(String),
    Const(Term),
}

impl PatternTerm {
    fn var(&self) -> Option<&str> {
        match self {
            PatternTerm::Var(v) => Some(v),
            PatternTerm::Const(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphScope {
    /// The union (default) view.
    Union,
    Named(Term),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPattern {
    pub scope: GraphScope,
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl QueryPattern {
    fn vars(&self) -> impl Iterator<Item = &str> {
        let graph_var = match &self.scope {
            GraphScope::Var(v) => Some(v.as_str()),
            _ => None,
        };
        graph_var
            .into_iter()
            .chain(self.subject.var())
            .chain(self.predicate.var())
            .chain(self.object.var())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternQuery {
    /// `None` for `SELECT *`.
    pub select: Option<Vec<String>>,
    pub distinct: bool,
    pub patterns: Vec<QueryPattern>,
    pub limit: Option<usize>,
}

/// Bound-variable tuples, one column per projected variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResults {
    pub variables: Vec<String>,
    pub rows: Vec<Vec<Option<Term>>>,
}

impl QueryResults {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one variable across all rows.
    pub fn column(&self, variable: &str) -> Option<Vec<Option<&Term>>> {
        let idx = self.variables.iter().position(|v| v == variable)?;
        Some(self.rows.iter().map(|row| row[idx].as_ref()).collect())
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum RawIri {
    Full(String),
    Prefixed(String, String),
}

#[derive(Debug, Clone, PartialEq)]
enum RawTerm {
    Var(String),
    Iri(RawIri),
    /// The `a` keyword.
    A,
    Literal {
        lexical: String,
        language: Option<String>,
        datatype: Option<RawIri>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum RawGraph {
    Var(String),
    Iri(RawIri),
}

#[derive(Debug, Clone, PartialEq)]
struct RawPattern {
    graph: Option<RawGraph>,
    subject: RawTerm,
    predicate: RawTerm,
    object: RawTerm,
}

#[derive(Debug, Clone, PartialEq)]
struct RawQuery {
    prefixes: Vec<(String, String)>,
    distinct: bool,
    select: Option<Vec<String>>,
    patterns: Vec<RawPattern>,
    limit: Option<usize>,
}

/// Whitespace and `#` comments.
fn sp(input: &str) -> IResult<&str, ()> {
    let mut rest = input;
    loop {
        let trimmed = rest.trim_start();
        if let Some(comment) = trimmed.strip_prefix('#') {
            rest = comment.find('\n').map_or("", |i| &comment[i..]);
        } else {
            return Ok((trimmed, ()));
        }
    }
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(sp, inner, sp)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(peek(one_of(
        "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-:",
    ))))
}

fn iriref(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            pchar('<'),
            take_while(|c: char| c != '>' && c != '<' && !c.is_whitespace()),
            pchar('>'),
        ),
        str::to_string,
    )(input)
}

fn pname(input: &str) -> IResult<&str, RawIri> {
    let (rest, prefix) = take_while(is_name_char)(input)?;
    let (rest, _) = pchar(':')(rest)?;
    let local_len: usize = rest
        .chars()
        .take_while(|c| is_name_char(*c) || *c == '.')
        .map(char::len_utf8)
        .sum();
    // A trailing `.` ends the triple, it is not part of the name.
    let local = rest[..local_len].trim_end_matches('.');
    Ok((
        &rest[local.len()..],
        RawIri::Prefixed(prefix.to_string(), local.to_string()),
    ))
}

fn iri(input: &str) -> IResult<&str, RawIri> {
    alt((map(iriref, RawIri::Full), pname))(input)
}

fn variable(input: &str) -> IResult<&str, String> {
    map(
        preceded(
            one_of("?$"),
            take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        ),
        str::to_string,
    )(input)
}

fn string_lit(input: &str) -> IResult<&str, String> {
    let (rest, _) = pchar('"')(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&rest[i + 1..], out)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                _ => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        &rest[i..],
                        nom::error::ErrorKind::Escaped,
                    )))
                }
            },
            '\n' => break,
            other => out.push(other),
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

enum LiteralSuffix {
    Lang(String),
    Datatype(RawIri),
}

fn rdf_literal(input: &str) -> IResult<&str, RawTerm> {
    map(
        pair(
            string_lit,
            opt(alt((
                map(
                    preceded(
                        pchar('@'),
                        recognize(pair(
                            take_while1(|c: char| c.is_ascii_alphabetic()),
                            take_while(|c: char| c.is_ascii_alphanumeric() || c == '-'),
                        )),
                    ),
                    |lang: &str| LiteralSuffix::Lang(lang.to_string()),
                ),
                map(preceded(tag("^^"), iri), LiteralSuffix::Datatype),
            ))),
        ),
        |(lexical, suffix)| match suffix {
            Some(LiteralSuffix::Lang(lang)) => RawTerm::Literal {
                lexical,
                language: Some(lang),
                datatype: None,
            },
            Some(LiteralSuffix::Datatype(dt)) => RawTerm::Literal {
                lexical,
                language: None,
                datatype: Some(dt),
            },
            None => RawTerm::Literal {
                lexical,
                language: None,
                datatype: None,
            },
        },
    )(input)
}

fn integer_lit(input: &str) -> IResult<&str, RawTerm> {
    map(
        recognize(pair(opt(one_of("+-")), digit1)),
        |digits: &str| RawTerm::Literal {
            lexical: digits.to_string(),
            language: None,
            datatype: Some(RawIri::Full(XSD_INTEGER.to_string())),
        },
    )(input)
}

fn boolean_lit(input: &str) -> IResult<&str, RawTerm> {
    map(
        alt((keyword("true"), keyword("false"))),
        |b: &str| RawTerm::Literal {
            lexical: b.to_ascii_lowercase(),
            language: None,
            datatype: Some(RawIri::Full(XSD_BOOLEAN.to_string())),
        },
    )(input)
}

fn term(input: &str) -> IResult<&str, RawTerm> {
    alt((
        map(variable, RawTerm::Var),
        map(iriref, |i| RawTerm::Iri(RawIri::Full(i))),
        rdf_literal,
        integer_lit,
        boolean_lit,
        map(pname, RawTerm::Iri),
    ))(input)
}

fn verb(input: &str) -> IResult<&str, RawTerm> {
    alt((
        value(RawTerm::A, terminated(pchar('a'), peek(multispace1))),
        term,
    ))(input)
}

type PredicateObjects = Vec<(RawTerm, Vec<RawTerm>)>;

/// `?s p1 o1, o2 ; p2 o3`
fn triples_same_subject(input: &str) -> IResult<&str, (RawTerm, PredicateObjects)> {
    terminated(
        pair(
            ws(term),
            separated_list1(
                ws(pchar(';')),
                pair(ws(verb), separated_list1(ws(pchar(',')), ws(term))),
            ),
        ),
        opt(ws(pchar(';'))),
    )(input)
}

fn expand_triples(graph: Option<RawGraph>, block: (RawTerm, PredicateObjects)) -> Vec<RawPattern> {
    let (subject, pos) = block;
    let mut out = Vec::new();
    for (predicate, objects) in pos {
        for object in objects {
            out.push(RawPattern {
                graph: graph.clone(),
                subject: subject.clone(),
                predicate: predicate.clone(),
                object,
            });
        }
    }
    out
}

fn triples_block(input: &str) -> IResult<&str, Vec<(RawTerm, PredicateObjects)>> {
    many0(terminated(triples_same_subject, opt(ws(pchar('.')))))(input)
}

fn graph_block(input: &str) -> IResult<&str, Vec<RawPattern>> {
    map(
        tuple((
            ws(keyword("graph")),
            ws(alt((
                map(variable, RawGraph::Var),
                map(iri, RawGraph::Iri),
            ))),
            delimited(ws(pchar('{')), triples_block, ws(pchar('}'))),
            opt(ws(pchar('.'))),
        )),
        |(_, graph, blocks, _)| {
            blocks
                .into_iter()
                .flat_map(|b| expand_triples(Some(graph.clone()), b))
                .collect()
        },
    )(input)
}

fn group_item(input: &str) -> IResult<&str, Vec<RawPattern>> {
    alt((
        graph_block,
        map(
            terminated(triples_same_subject, opt(ws(pchar('.')))),
            |b| expand_triples(None, b),
        ),
    ))(input)
}

fn prefix_decl(input: &str) -> IResult<&str, (String, String)> {
    map(
        tuple((
            ws(keyword("prefix")),
            ws(terminated(take_while(is_name_char), pchar(':'))),
            ws(iriref),
        )),
        |(_, prefix, iri)| (prefix.to_string(), iri),
    )(input)
}

fn select_clause(input: &str) -> IResult<&str, (bool, Option<Vec<String>>)> {
    preceded(
        ws(keyword("select")),
        pair(
            map(opt(ws(keyword("distinct"))), |d| d.is_some()),
            alt((
                value(None, ws(pchar('*'))),
                map(many1(ws(variable)), Some),
            )),
        ),
    )(input)
}

fn raw_query(input: &str) -> IResult<&str, RawQuery> {
    map(
        tuple((
            many0(prefix_decl),
            select_clause,
            opt(ws(keyword("where"))),
            delimited(ws(pchar('{')), many0(group_item), ws(pchar('}'))),
            opt(preceded(
                ws(keyword("limit")),
                ws(map_res(digit1, |s: &str| s.parse::<usize>())),
            )),
        )),
        |(prefixes, (distinct, select), _, items, limit)| RawQuery {
            prefixes,
            distinct,
            select,
            patterns: items.into_iter().flatten().collect(),
            limit,
        },
    )(input)
}

// ============================================================================
// Resolution
// ============================================================================

struct Resolver<'a> {
    base: &'a Namespaces,
    local: BTreeMap<String, String>,
}

impl Resolver<'_> {
    fn iri(&self, raw: &RawIri) -> Result<String> {
        match raw {
            RawIri::Full(iri) => Ok(iri.clone()),
            RawIri::Prefixed(prefix, local) => {
                let ns = self
                    .local
                    .get(prefix)
                    .map(String::as_str)
                    .or_else(|| self.base.get(prefix))
                    .ok_or_else(|| {
                        GraphError::query(
                            &format!("{prefix}:{local}"),
                            format!("unknown prefix `{prefix}:`"),
                        )
                    })?;
                Ok(format!("{ns}{local}"))
            }
        }
    }

    fn term(&self, raw: &RawTerm) -> Result<PatternTerm> {
        Ok(match raw {
            RawTerm::Var(v) => PatternTerm::Var(v.clone()),
            RawTerm::A => PatternTerm::Const(Term::iri(RDF_TYPE)),
            RawTerm::Iri(i) => PatternTerm::Const(Term::Iri(self.iri(i)?)),
            RawTerm::Literal {
                lexical,
                language,
                datatype,
            } => {
                let lit = match (language, datatype) {
                    (Some(lang), _) => Literal::lang(lexical.clone(), lang.clone()),
                    (None, Some(dt)) => Literal::typed(lexical.clone(), self.iri(dt)?),
                    (None, None) => Literal::plain(lexical.clone()),
                };
                PatternTerm::Const(Term::Literal(lit))
            }
        })
    }
}

impl PatternQuery {
    pub fn parse(text: &str, namespaces: &Namespaces) -> Result<Self> {
        let raw = match all_consuming(ws(raw_query))(text) {
            Ok((_, raw)) => raw,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                return Err(GraphError::query(e.input, "syntax error"));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(GraphError::query("", "incomplete query"));
            }
        };

        let resolver = Resolver {
            base: namespaces,
            local: raw.prefixes.into_iter().collect(),
        };

        let mut patterns = Vec::with_capacity(raw.patterns.len());
        for p in &raw.patterns {
            let scope = match &p.graph {
                None => GraphScope::Union,
                Some(RawGraph::Var(v)) => GraphScope::Var(v.clone()),
                Some(RawGraph::Iri(i)) => GraphScope::Named(Term::Iri(resolver.iri(i)?)),
            };
            let predicate = resolver.term(&p.predicate)?;
            if let PatternTerm::Const(t) = &predicate {
                if t.as_iri().is_none() {
                    return Err(GraphError::query(
                        &t.to_string(),
                        "predicate must be an IRI or a variable",
                    ));
                }
            }
            patterns.push(QueryPattern {
                scope,
                subject: resolver.term(&p.subject)?,
                predicate,
                object: resolver.term(&p.object)?,
            });
        }

        Ok(PatternQuery {
            select: raw.select,
            distinct: raw.distinct,
            patterns,
            limit: raw.limit,
        })
    }

    /// Projected variables: the explicit list, or every variable in order of
    /// first appearance for `SELECT *`.
    pub fn variables(&self) -> Vec<String> {
        if let Some(select) = &self.select {
            return select.clone();
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for p in &self.patterns {
            for v in p.vars() {
                if seen.insert(v) {
                    out.push(v.to_string());
                }
            }
        }
        out
    }

    pub fn execute(&self, store: &GraphStore) -> QueryResults {
        let variables = self.variables();
        // Without DISTINCT the first `limit` solutions are final.
        let cap = if self.distinct { None } else { self.limit };

        let mut solutions = Vec::new();
        let mut remaining: Vec<usize> = (0..self.patterns.len()).collect();
        let mut binding = Binding::new();
        self.solve(store, &mut remaining, &mut binding, &mut solutions, cap);

        let mut rows: Vec<Vec<Option<Term>>> = solutions
            .into_iter()
            .map(|b| variables.iter().map(|v| b.get(v).cloned()).collect())
            .collect();
        if self.distinct {
            let mut seen = HashSet::new();
            rows.retain(|row| seen.insert(row.clone()));
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        QueryResults { variables, rows }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

type Binding = BTreeMap<String, Term>;

fn resolve(term: &PatternTerm, binding: &Binding) -> Option<Term> {
    match term {
        PatternTerm::Const(t) => Some(t.clone()),
        PatternTerm::Var(v) => binding.get(v).cloned(),
    }
}

/// How constrained a pattern is under the current binding.
fn bound_positions(p: &QueryPattern, binding: &Binding) -> usize {
    let graph = match &p.scope {
        GraphScope::Union => 0,
        GraphScope::Named(_) => 1,
        GraphScope::Var(v) => usize::from(binding.contains_key(v)),
    };
    graph
        + [&p.subject, &p.predicate, &p.object]
            .into_iter()
            .filter(|t| resolve(t, binding).is_some())
            .count()
}

fn bind(term: &PatternTerm, value: &Term, binding: &mut Binding, added: &mut Vec<String>) -> bool {
    match term {
        PatternTerm::Const(t) => t == value,
        PatternTerm::Var(v) => match binding.get(v) {
            Some(existing) => existing == value,
            None => {
                binding.insert(v.clone(), value.clone());
                added.push(v.clone());
                true
            }
        },
    }
}

fn candidates(store: &GraphStore, p: &QueryPattern, binding: &Binding) -> Vec<(Option<Term>, Triple)> {
    let pattern = TriplePattern {
        subject: resolve(&p.subject, binding),
        predicate: resolve(&p.predicate, binding),
        object: resolve(&p.object, binding),
    };
    let from_quads = |graph: Option<&Term>| {
        store
            .quads(&pattern, graph)
            .into_iter()
            .filter(|q| q.graph.is_some())
            .map(|q| (q.graph, q.triple))
            .collect::<Vec<_>>()
    };
    match &p.scope {
        GraphScope::Union => store
            .triples(&pattern)
            .into_iter()
            .map(|t| (None, t))
            .collect(),
        GraphScope::Named(g) => from_quads(Some(g)),
        GraphScope::Var(v) => match binding.get(v) {
            Some(g) => from_quads(Some(g)),
            None => from_quads(None),
        },
    }
}

impl PatternQuery {
    fn solve(
        &self,
        store: &GraphStore,
        remaining: &mut Vec<usize>,
        binding: &mut Binding,
        out: &mut Vec<Binding>,
        cap: Option<usize>,
    ) {
        if cap.is_some_and(|c| out.len() >= c) {
            return;
        }
        let Some(pos) = (0..remaining.len())
            .max_by_key(|&i| (bound_positions(&self.patterns[remaining[i]], binding), usize::MAX - i))
        else {
            out.push(binding.clone());
            return;
        };

        let idx = remaining.swap_remove(pos);
        let p = &self.patterns[idx];
        for (graph, triple) in candidates(store, p, binding) {
            let mut added = Vec::new();
            let ok = match (&p.scope, &graph) {
                (GraphScope::Var(v), Some(g)) => bind(&PatternTerm::Var(v.clone()), g, binding, &mut added),
                _ => true,
            } && bind(&p.subject, &triple.subject, binding, &mut added)
                && bind(&p.predicate, &triple.predicate, binding, &mut added)
                && bind(&p.object, &triple.object, binding, &mut added);
            if ok {
                self.solve(store, remaining, binding, out, cap);
            }
            for v in added {
                binding.remove(&v);
            }
            if cap.is_some_and(|c| out.len() >= c) {
                break;
            }
        }
        remaining.push(idx);
        let last = remaining.len() - 1;
        remaining.swap(pos, last);
    }
}

impl GraphStore {
    /// Parse and run a pattern query against this store.
    pub fn query(&self, text: &str) -> Result<QueryResults> {
        let query = PatternQuery::parse(text, self.namespaces())?;
        Ok(query.execute(self))
    }
}
