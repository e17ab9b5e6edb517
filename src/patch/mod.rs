//! Semantic updates of RDF resources.
//!
//! Both front ends produce the same [Operations](Operations) shape.
//! [apply_patch](apply_patch) binds variables of the `where` clause against
//! the current graph, checks that everything to be deleted is present, and
//! only then mutates the graph.

use std::collections::HashMap;

use log::debug;
use uuid::Uuid;

use crate::auth::wac::Mode;
use crate::error::RequestError;
use crate::rdf::{
    self,
    Graph,
    Term,
    Triple,
};

/// SPARQL 1.1 Update.
pub mod sparql;

/// Solid N3 patch documents.
pub mod n3;

pub const SPARQL_UPDATE: &str = "application/sparql-update";

/// Value of the `Accept-Patch` header.
pub const ACCEPT_PATCH: &str = "application/sparql-update, text/n3";

/// Upper bound on solutions of a `where` clause.
const MAX_SOLUTIONS: usize = 10000;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Operations {
    pub insert: Option<Vec<Triple>>,
    pub delete: Option<Vec<Triple>>,
    pub where_clause: Option<Vec<Triple>>,
}

fn append(into: &mut Option<Vec<Triple>>, triples: Vec<Triple>) {
    match into {
        Some(v) => v.extend(triples),
        None => *into = Some(triples),
    }
}

impl Operations {
    pub fn is_empty(&self) -> bool {
        self.insert.is_none() && self.delete.is_none() && self.where_clause.is_none()
    }

    pub fn add_insert(&mut self, triples: Vec<Triple>) {
        append(&mut self.insert, triples);
    }

    pub fn add_delete(&mut self, triples: Vec<Triple>) {
        append(&mut self.delete, triples);
    }

    pub fn add_where(&mut self, triples: Vec<Triple>) {
        append(&mut self.where_clause, triples);
    }
}

/// A parsed PATCH request body.
#[derive(Clone, Debug)]
pub struct PatchObject {
    pub raw_text: String,
    pub target_uri: String,
    pub content_type: String,
    pub operations: Operations,
}

impl PatchObject {
    /// Modes the requesting agent needs on the patched resource.
    pub fn required_modes(&self) -> Vec<Mode> {
        let ops = &self.operations;
        if ops.delete.is_some() {
            return vec!(Mode::Read, Mode::Write);
        }
        if ops.where_clause.is_some() {
            return vec!(Mode::Read, Mode::Append);
        }
        vec!(Mode::Append)
    }
}

/// Parse a PATCH body of `content_type` addressed to `target_uri`.
pub fn parse_patch(text: &str, content_type: &str, target_uri: &str) -> Result<PatchObject, RequestError> {
    let ct = rdf::essence(content_type);
    let operations = match ct.as_str() {
        SPARQL_UPDATE => sparql::parse(text, target_uri)?,
        rdf::TEXT_N3 => n3::parse(text, target_uri)?,
        _ => {
            return Err(RequestError::new(
                crate::error::RequestErrorType::UnsupportedMediaType,
                &format!("unsupported patch content type {}", content_type),
            ));
        },
    };
    if operations.is_empty() {
        return Err(RequestError::bad_request("patch contains no operations"));
    }
    Ok(PatchObject {
        raw_text: text.to_string(),
        target_uri: target_uri.to_string(),
        content_type: ct,
        operations,
    })
}

type Bindings = HashMap<String, Term>;

/// Blank nodes of a pattern behave as variables.
fn as_pattern(triples: &[Triple]) -> Vec<Triple> {
    let var = |t: &Term| match t {
        Term::Blank(b) => Term::Variable(format!("_:{}", b)),
        v => v.clone(),
    };
    triples.iter().map(|t| Triple::new(var(&t.subject), var(&t.predicate), var(&t.object))).collect()
}

fn bound(term: &Term, bindings: &Bindings) -> Option<Term> {
    match term {
        Term::Variable(v) => bindings.get(v).cloned(),
        t => Some(t.clone()),
    }
}

fn unify(pattern: &Term, value: &Term, bindings: &mut Bindings) -> bool {
    match pattern {
        Term::Variable(v) => match bindings.get(v) {
            Some(b) => b == value,
            None => {
                bindings.insert(v.clone(), value.clone());
                true
            },
        },
        t => t == value,
    }
}

fn solve(patterns: &[Triple], graph: &Graph, bindings: Bindings, out: &mut Vec<Bindings>) {
    if out.len() >= MAX_SOLUTIONS {
        return;
    }
    let (first, rest) = match patterns.split_first() {
        Some(v) => v,
        None => {
            out.push(bindings);
            return;
        },
    };
    let s = bound(&first.subject, &bindings);
    let p = bound(&first.predicate, &bindings);
    let o = bound(&first.object, &bindings);
    let candidates: Vec<&Triple> = graph.matching(s.as_ref(), p.as_ref(), o.as_ref()).collect();
    for t in candidates {
        let mut b = bindings.clone();
        if unify(&first.subject, &t.subject, &mut b)
            && unify(&first.predicate, &t.predicate, &mut b)
            && unify(&first.object, &t.object, &mut b) {
            solve(rest, graph, b, out);
        }
    }
}

fn instantiate(triple: &Triple, bindings: &Bindings) -> Option<Triple> {
    Some(Triple::new(
        bound(&triple.subject, bindings)?,
        bound(&triple.predicate, bindings)?,
        bound(&triple.object, bindings)?,
    ))
}

fn fresh_blanks(triple: Triple, suffix: &str) -> Triple {
    let rename = |t: Term| match t {
        Term::Blank(b) => Term::Blank(format!("{}x{}", b, suffix)),
        v => v,
    };
    Triple::new(rename(triple.subject), rename(triple.predicate), rename(triple.object))
}

/// Apply `patch` to `graph` as a single mutation. On error `graph` is untouched.
pub fn apply_patch(patch: &PatchObject, graph: &mut Graph) -> Result<(), RequestError> {
    let ops = &patch.operations;
    let single = rdf::essence(&patch.content_type) == rdf::TEXT_N3;

    let delete = match &ops.delete {
        Some(v) => as_pattern(v),
        None => vec!(),
    };
    let conditions = match &ops.where_clause {
        Some(v) => as_pattern(v),
        None if delete.iter().any(|t| t.has_variables()) => delete.clone(),
        None => vec!(),
    };

    let mut solutions = vec!();
    solve(&conditions, graph, Bindings::new(), &mut solutions);
    debug!("patch of {} has {} solution(s)", patch.target_uri, solutions.len());
    if solutions.is_empty() {
        return Err(RequestError::conflict("the patch conditions do not match the resource"));
    }
    if single && solutions.len() > 1 {
        return Err(RequestError::conflict("the patch conditions match more than one binding"));
    }

    let mut removals = vec!();
    let mut additions = vec!();
    for b in solutions.iter() {
        for t in delete.iter() {
            let ground = match instantiate(t, b) {
                Some(v) => v,
                None => {
                    return Err(RequestError::bad_request(&format!("unbound variable in deleted triple {}", t)));
                },
            };
            if !graph.contains(&ground) {
                return Err(RequestError::conflict(&format!("cannot delete {}: not in the resource", ground)));
            }
            removals.push(ground);
        }
        let suffix = Uuid::new_v4().simple().to_string();
        if let Some(insert) = &ops.insert {
            for t in insert.iter() {
                let ground = match instantiate(t, b) {
                    Some(v) => v,
                    None => {
                        return Err(RequestError::bad_request(&format!("unbound variable in inserted triple {}", t)));
                    },
                };
                additions.push(fresh_blanks(ground, &suffix[..8]));
            }
        }
    }

    for t in removals.iter() {
        graph.remove(t);
    }
    for t in additions {
        graph.insert(t);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::auth::wac::Mode;
    use crate::rdf::{
        parse,
        Graph,
        Term,
        Triple,
    };
    use super::{
        apply_patch,
        parse_patch,
    };

    const DOC: &str = "https://pod.example/profile/card";

    fn graph(text: &str) -> Graph {
        parse(text, "text/turtle", DOC).unwrap()
    }

    fn triple(s: &str, p: &str, o: Term) -> Triple {
        Triple::new(Term::iri(s), Term::iri(p), o)
    }

    #[test]
    fn test_unknown_type() {
        let e = parse_patch("", "text/plain", DOC).unwrap_err();
        assert_eq!(e.status(), 415);
    }

    #[test]
    fn test_empty_patch() {
        let e = parse_patch("PREFIX ex: <http://ex/>", "application/sparql-update", DOC).unwrap_err();
        assert_eq!(e.status(), 400);
    }

    #[test]
    fn test_insert_delete_data() {
        let mut g = graph("<#me> <http://ex/name> \"Old\" .");
        let p = parse_patch(
            "DELETE DATA { <#me> <http://ex/name> \"Old\" . } ; INSERT DATA { <#me> <http://ex/name> \"New\" . }",
            "application/sparql-update",
            DOC,
        ).unwrap();
        assert_eq!(p.required_modes(), vec!(Mode::Read, Mode::Write));
        apply_patch(&p, &mut g).unwrap();
        assert_eq!(g.len(), 1);
        assert!(g.contains(&triple("https://pod.example/profile/card#me", "http://ex/name", Term::string("New"))));
    }

    #[test]
    fn test_missing_delete_is_conflict() {
        let mut g = graph("<#me> <http://ex/name> \"Old\" .");
        let before = g.clone();
        let p = parse_patch(
            "DELETE DATA { <#me> <http://ex/name> \"Other\" . }",
            "application/sparql-update",
            DOC,
        ).unwrap();
        let e = apply_patch(&p, &mut g).unwrap_err();
        assert_eq!(e.status(), 409);
        assert_eq!(g, before);
    }

    #[test]
    fn test_insert_only_needs_append() {
        let p = parse_patch("INSERT DATA { <a> <b> <c> . }", "application/sparql-update", DOC).unwrap();
        assert_eq!(p.required_modes(), vec!(Mode::Append));
        let mut g = Graph::new();
        apply_patch(&p, &mut g).unwrap();
        apply_patch(&p, &mut g).unwrap();
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_sparql_where() {
        let mut g = graph("<#a> <http://ex/n> 1 . <#b> <http://ex/n> 1 .");
        let p = parse_patch(
            "PREFIX ex: <http://ex/>\nDELETE { ?x ex:n 1 } INSERT { ?x ex:n 2 } WHERE { ?x ex:n 1 }",
            "application/sparql-update",
            DOC,
        ).unwrap();
        apply_patch(&p, &mut g).unwrap();
        assert_eq!(g.len(), 2);
        assert!(g.iter().all(|t| t.object == Term::typed("2", crate::rdf::XSD_INTEGER)));
    }

    #[test]
    fn test_n3_single_binding() {
        let text = "@prefix solid: <http://www.w3.org/ns/solid/terms#>.\n@prefix ex: <http://ex/>.\n\
            _:r a solid:InsertDeletePatch;\n\
              solid:where { ?p ex:family \"Garcia\". };\n\
              solid:inserts { ?p ex:given \"Alex\". };\n\
              solid:deletes { ?p ex:given \"Claudia\". }.";
        let p = parse_patch(text, "text/n3", DOC).unwrap();
        assert_eq!(p.required_modes(), vec!(Mode::Read, Mode::Write));

        let mut g = graph("<#me> <http://ex/family> \"Garcia\"; <http://ex/given> \"Claudia\" .");
        apply_patch(&p, &mut g).unwrap();
        assert!(g.contains(&triple("https://pod.example/profile/card#me", "http://ex/given", Term::string("Alex"))));
        assert_eq!(g.len(), 2);

        let mut g = graph("<#a> <http://ex/family> \"Garcia\" . <#b> <http://ex/family> \"Garcia\" .");
        assert_eq!(apply_patch(&p, &mut g).unwrap_err().status(), 409);
    }

    #[test]
    fn test_inserted_blank_nodes_are_fresh() {
        let mut g = graph("<#me> <http://ex/knows> [ <http://ex/n> \"x\" ] .");
        let p = parse_patch("INSERT DATA { <#me> <http://ex/knows> [ <http://ex/n> \"y\" ] . }", "application/sparql-update", DOC).unwrap();
        apply_patch(&p, &mut g).unwrap();
        assert_eq!(g.len(), 4);
    }
}
