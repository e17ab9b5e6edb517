use log::debug;
use spargebra::algebra::GraphPattern;
use spargebra::term::{
    GraphName,
    GraphNamePattern,
    GroundTerm,
    GroundTermPattern,
    NamedNodePattern,
    TermPattern,
};
use spargebra::{
    GraphUpdateOperation,
    SparqlParser,
};

use crate::error::RequestError;
use crate::rdf::syntax::{
    from_literal,
    from_term,
};
use crate::rdf::{
    Term,
    Triple,
};
use super::Operations;

fn unsupported(what: &str) -> RequestError {
    RequestError::bad_request(&format!("{} is not supported in patches", what))
}

fn pattern_term(t: &TermPattern) -> Result<Term, RequestError> {
    match t {
        TermPattern::NamedNode(n) => Ok(Term::Iri(n.as_str().to_string())),
        TermPattern::BlankNode(b) => Ok(Term::Blank(b.as_str().to_string())),
        TermPattern::Literal(l) => Ok(from_literal(l)),
        TermPattern::Variable(v) => Ok(Term::Variable(v.as_str().to_string())),
        #[allow(unreachable_patterns)]
        _ => Err(unsupported("a quoted triple")),
    }
}

fn ground_pattern_term(t: &GroundTermPattern) -> Result<Term, RequestError> {
    match t {
        GroundTermPattern::NamedNode(n) => Ok(Term::Iri(n.as_str().to_string())),
        GroundTermPattern::Literal(l) => Ok(from_literal(l)),
        GroundTermPattern::Variable(v) => Ok(Term::Variable(v.as_str().to_string())),
        #[allow(unreachable_patterns)]
        _ => Err(unsupported("a quoted triple")),
    }
}

fn ground_term(t: GroundTerm) -> Result<Term, RequestError> {
    match t {
        GroundTerm::NamedNode(n) => Ok(Term::Iri(n.into_string())),
        GroundTerm::Literal(l) => Ok(from_literal(&l)),
        #[allow(unreachable_patterns)]
        _ => Err(unsupported("a quoted triple")),
    }
}

fn predicate(p: &NamedNodePattern) -> Term {
    match p {
        NamedNodePattern::NamedNode(n) => Term::Iri(n.as_str().to_string()),
        NamedNodePattern::Variable(v) => Term::Variable(v.as_str().to_string()),
    }
}

fn default_graph(graph: &GraphNamePattern) -> Result<(), RequestError> {
    match graph {
        GraphNamePattern::DefaultGraph => Ok(()),
        _ => Err(unsupported("GRAPH")),
    }
}

fn where_clause(pattern: &GraphPattern) -> Result<Vec<Triple>, RequestError> {
    match pattern {
        GraphPattern::Bgp { patterns } => {
            let mut out = vec!();
            for p in patterns.iter() {
                out.push(Triple::new(pattern_term(&p.subject)?, predicate(&p.predicate), pattern_term(&p.object)?));
            }
            Ok(out)
        },
        _ => Err(unsupported("a WHERE clause beyond basic triple patterns")),
    }
}

fn operation(op: GraphUpdateOperation, ops: &mut Operations) -> Result<(), RequestError> {
    match op {
        GraphUpdateOperation::InsertData { data } => {
            let mut triples = vec!();
            for q in data {
                if !matches!(q.graph_name, GraphName::DefaultGraph) {
                    return Err(unsupported("GRAPH"));
                }
                triples.push(Triple::new(
                    from_term(q.subject.into())?,
                    Term::Iri(q.predicate.into_string()),
                    from_term(q.object)?,
                ));
            }
            ops.add_insert(triples);
        },
        GraphUpdateOperation::DeleteData { data } => {
            let mut triples = vec!();
            for q in data {
                if !matches!(q.graph_name, GraphName::DefaultGraph) {
                    return Err(unsupported("GRAPH"));
                }
                triples.push(Triple::new(
                    ground_term(GroundTerm::from(q.subject))?,
                    Term::Iri(q.predicate.into_string()),
                    ground_term(q.object)?,
                ));
            }
            ops.add_delete(triples);
        },
        GraphUpdateOperation::DeleteInsert { delete, insert, pattern, .. } => {
            let mut deleted = vec!();
            for q in delete.iter() {
                default_graph(&q.graph_name)?;
                deleted.push(Triple::new(ground_pattern_term(&q.subject)?, predicate(&q.predicate), ground_pattern_term(&q.object)?));
            }
            let mut inserted = vec!();
            for q in insert.iter() {
                default_graph(&q.graph_name)?;
                inserted.push(Triple::new(pattern_term(&q.subject)?, predicate(&q.predicate), pattern_term(&q.object)?));
            }
            if !deleted.is_empty() {
                ops.add_delete(deleted);
            }
            if !inserted.is_empty() {
                ops.add_insert(inserted);
            }
            let conditions = where_clause(&pattern)?;
            if !conditions.is_empty() {
                ops.add_where(conditions);
            }
        },
        _ => {
            return Err(unsupported("this update operation"));
        },
    };
    Ok(())
}

/// Parse a SPARQL update request. Several `;`-separated operations merge into one.
pub fn parse(text: &str, base: &str) -> Result<Operations, RequestError> {
    let parser = match SparqlParser::new().with_base_iri(base) {
        Ok(v) => v,
        Err(e) => {
            return Err(RequestError::internal(&format!("invalid base {}: {}", base, e)));
        },
    };
    let update = match parser.parse_update(text) {
        Ok(v) => v,
        Err(e) => {
            return Err(RequestError::bad_request(&format!("invalid sparql update: {}", e)));
        },
    };
    let mut ops = Operations::default();
    for op in update.operations {
        operation(op, &mut ops)?;
    }
    debug!("sparql update parsed: {:?}", ops);
    Ok(ops)
}
