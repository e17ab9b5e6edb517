use crate::error::RequestError;
use crate::rdf::syntax::parse_n3;
use crate::rdf::{
    Graph,
    Term,
    Triple,
    RDF_TYPE,
    SOLID,
};
use super::Operations;

fn formula(graph: &Graph, patch: &Term, predicate: &str) -> Result<Option<Vec<Triple>>, RequestError> {
    let values = graph.objects(patch, &format!("{}{}", SOLID, predicate));
    match values.len() {
        0 => Ok(None),
        1 => match values.into_iter().next() {
            Some(Term::Formula(v)) => Ok(Some(v)),
            _ => Err(RequestError::bad_request(&format!("solid:{} must be a formula", predicate))),
        },
        _ => Err(RequestError::bad_request(&format!("more than one solid:{}", predicate))),
    }
}

/// Parse an N3 patch document: one resource typed `solid:InsertDeletePatch`
/// (or `solid:Patch`) with optional `solid:where`, `solid:inserts` and
/// `solid:deletes` formulas.
pub fn parse(text: &str, base: &str) -> Result<Operations, RequestError> {
    let graph = Graph::from_triples(parse_n3(text, base)?);
    let mut patches = vec!();
    for class in ["InsertDeletePatch", "Patch"].iter() {
        for s in graph.subjects(RDF_TYPE, &Term::iri(&format!("{}{}", SOLID, class))) {
            if !patches.contains(&s) {
                patches.push(s);
            }
        }
    }
    let patch = match patches.len() {
        0 => return Err(RequestError::bad_request("no solid:InsertDeletePatch found")),
        1 => &patches[0],
        _ => return Err(RequestError::bad_request("more than one patch resource")),
    };

    let ops = Operations {
        insert: formula(&graph, patch, "inserts")?,
        delete: formula(&graph, patch, "deletes")?,
        where_clause: formula(&graph, patch, "where")?,
    };
    if let Some(insert) = &ops.insert {
        if insert.iter().any(|t| matches!(t.subject, Term::Blank(_)) || matches!(t.object, Term::Blank(_))) {
            return Err(RequestError::bad_request("blank nodes are not allowed in solid:inserts"));
        }
    }
    if let Some(delete) = &ops.delete {
        if delete.iter().any(|t| matches!(t.subject, Term::Blank(_)) || matches!(t.object, Term::Blank(_))) {
            return Err(RequestError::bad_request("blank nodes are not allowed in solid:deletes"));
        }
    }
    Ok(ops)
}
