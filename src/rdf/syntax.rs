use std::collections::HashMap;
use std::fmt;

use oxrdf::{
    BlankNode,
    GraphName,
    NamedNode,
};
use oxrdfio::{
    RdfFormat,
    RdfParser,
    RdfSerializer,
};
use oxttl::n3::{
    N3Quad,
    N3Term,
};
use oxttl::N3Parser;

use crate::error::{
    RequestError,
    RequestErrorType,
};
use super::{
    essence,
    Graph,
    Literal,
    Term,
    Triple,
    TEXT_N3,
    TEXT_TURTLE,
};

fn syntax_error(content_type: &str, e: impl fmt::Display) -> RequestError {
    RequestError::bad_request(&format!("invalid {}: {}", content_type, e))
}

fn inexpressible(term: &Term) -> RequestError {
    RequestError::new(RequestErrorType::NotAcceptable, &format!("{:?} cannot be serialized", term))
}

pub fn from_literal(l: &oxrdf::Literal) -> Term {
    Term::Literal(Literal {
        value: l.value().to_string(),
        datatype: l.datatype().as_str().to_string(),
        language: l.language().map(|v| v.to_ascii_lowercase()),
    })
}

pub fn from_term(term: oxrdf::Term) -> Result<Term, RequestError> {
    match term {
        oxrdf::Term::NamedNode(n) => Ok(Term::Iri(n.into_string())),
        oxrdf::Term::BlankNode(b) => Ok(Term::Blank(b.as_str().to_string())),
        oxrdf::Term::Literal(l) => Ok(from_literal(&l)),
        #[allow(unreachable_patterns)]
        _ => Err(RequestError::bad_request("quoted triples are not supported")),
    }
}

fn to_literal(l: &Literal) -> oxrdf::Literal {
    match &l.language {
        Some(lang) => oxrdf::Literal::new_language_tagged_literal_unchecked(l.value.as_str(), lang.as_str()),
        None => oxrdf::Literal::new_typed_literal(l.value.as_str(), NamedNode::new_unchecked(l.datatype.as_str())),
    }
}

/// The term as it appears in an RDF graph. Variables and formulas have no such form.
pub fn to_term(term: &Term) -> Result<oxrdf::Term, RequestError> {
    match term {
        Term::Iri(v) => Ok(NamedNode::new_unchecked(v.as_str()).into()),
        Term::Blank(v) => Ok(BlankNode::new_unchecked(v.as_str()).into()),
        Term::Literal(l) => Ok(to_literal(l).into()),
        v => Err(inexpressible(v)),
    }
}

fn to_triple(t: &Triple) -> Result<oxrdf::Triple, RequestError> {
    let predicate = match &t.predicate {
        Term::Iri(v) => NamedNode::new_unchecked(v.as_str()),
        v => return Err(inexpressible(v)),
    };
    let object = to_term(&t.object)?;
    match &t.subject {
        Term::Iri(v) => Ok(oxrdf::Triple::new(NamedNode::new_unchecked(v.as_str()), predicate, object)),
        Term::Blank(v) => Ok(oxrdf::Triple::new(BlankNode::new_unchecked(v.as_str()), predicate, object)),
        v => Err(inexpressible(v)),
    }
}

/// Parse Turtle, N-Triples or JSON-LD.
pub fn parse_triples(text: &str, content_type: &str, base: &str) -> Result<Vec<Triple>, RequestError> {
    let e = essence(content_type);
    let format = match RdfFormat::from_media_type(&e) {
        Some(v) => v,
        None => {
            return Err(RequestError::new(RequestErrorType::UnsupportedMediaType, &format!("cannot parse {}", e)));
        },
    };
    let parser = match RdfParser::from_format(format).with_base_iri(base) {
        Ok(v) => v,
        Err(err) => {
            return Err(RequestError::internal(&format!("invalid base {}: {}", base, err)));
        },
    };
    let mut out = vec!();
    for q in parser.for_reader(text.as_bytes()) {
        let q = match q {
            Ok(v) => v,
            Err(err) => return Err(syntax_error(&e, err)),
        };
        out.push(Triple::new(
            from_term(q.subject.into())?,
            Term::Iri(q.predicate.into_string()),
            from_term(q.object)?,
        ));
    }
    Ok(out)
}

fn n3_term(term: &N3Term, formulas: &HashMap<String, Vec<N3Quad>>) -> Result<Term, RequestError> {
    match term {
        N3Term::NamedNode(n) => Ok(Term::Iri(n.as_str().to_string())),
        N3Term::BlankNode(b) => match formulas.get(b.as_str()) {
            Some(quads) => Ok(Term::Formula(n3_triples(quads, formulas)?)),
            None => Ok(Term::Blank(b.as_str().to_string())),
        },
        N3Term::Literal(l) => Ok(from_literal(l)),
        N3Term::Variable(v) => Ok(Term::Variable(v.as_str().to_string())),
        #[allow(unreachable_patterns)]
        _ => Err(RequestError::bad_request("quoted triples are not supported")),
    }
}

fn n3_triples(quads: &[N3Quad], formulas: &HashMap<String, Vec<N3Quad>>) -> Result<Vec<Triple>, RequestError> {
    let mut out = vec!();
    for q in quads.iter() {
        out.push(Triple::new(
            n3_term(&q.subject, formulas)?,
            n3_term(&q.predicate, formulas)?,
            n3_term(&q.object, formulas)?,
        ));
    }
    Ok(out)
}

/// Parse N3. Quoted graphs become [Formula](Term::Formula) terms and
/// `?x` becomes a [Variable](Term::Variable).
pub fn parse_n3(text: &str, base: &str) -> Result<Vec<Triple>, RequestError> {
    let parser = match N3Parser::new().with_base_iri(base) {
        Ok(v) => v,
        Err(e) => {
            return Err(RequestError::internal(&format!("invalid base {}: {}", base, e)));
        },
    };
    let mut top = vec!();
    let mut formulas: HashMap<String, Vec<N3Quad>> = HashMap::new();
    for q in parser.for_reader(text.as_bytes()) {
        let q = match q {
            Ok(v) => v,
            Err(e) => return Err(syntax_error(TEXT_N3, e)),
        };
        let formula = match &q.graph_name {
            GraphName::BlankNode(b) => Some(b.as_str().to_string()),
            _ => None,
        };
        match formula {
            Some(id) => formulas.entry(id).or_insert_with(Vec::new).push(q),
            None => top.push(q),
        };
    }
    n3_triples(&top, &formulas)
}

/// Write `graph` as Turtle, N-Triples or JSON-LD. N3 gets Turtle, which it contains.
pub fn serialize_graph(graph: &Graph, content_type: &str) -> Result<String, RequestError> {
    let mut e = essence(content_type);
    if e == TEXT_N3 {
        e = TEXT_TURTLE.to_string();
    }
    let format = match RdfFormat::from_media_type(&e) {
        Some(v) => v,
        None => {
            return Err(RequestError::new(RequestErrorType::NotAcceptable, &format!("cannot serialize to {}", e)));
        },
    };
    let mut w = RdfSerializer::from_format(format).for_writer(Vec::new());
    for t in graph.iter() {
        let triple = to_triple(t)?;
        w.serialize_triple(triple.as_ref())?;
    }
    let data = w.finish()?;
    match String::from_utf8(data) {
        Ok(v) => Ok(v),
        Err(err) => Err(RequestError::internal(&format!("serializer wrote invalid utf-8: {}", err))),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        parse_n3,
        parse_triples,
        serialize_graph,
    };
    use crate::rdf::{
        Graph,
        Term,
        Triple,
        LDP,
        RDF_TYPE,
        XSD_BOOLEAN,
        XSD_INTEGER,
    };

    const BASE: &str = "https://pod.example/c/doc.ttl";

    fn turtle(text: &str) -> Vec<Triple> {
        parse_triples(text, "text/turtle", BASE).unwrap()
    }

    #[test]
    fn test_relative_and_prefixed() {
        let text = "@prefix ex: <http://ex.example/ns#> .\n<a> ex:knows <../b>, <#me> ; a ex:Person .";
        let g = Graph::from_triples(turtle(text));
        assert_eq!(g.len(), 3);
        let a = Term::iri("https://pod.example/c/a");
        let knows = Term::iri("http://ex.example/ns#knows");
        assert!(g.contains(&Triple::new(a.clone(), knows.clone(), Term::iri("https://pod.example/b"))));
        assert!(g.contains(&Triple::new(a.clone(), knows, Term::iri("https://pod.example/c/doc.ttl#me"))));
        assert!(g.contains(&Triple::new(a, Term::iri(RDF_TYPE), Term::iri("http://ex.example/ns#Person"))));
    }

    #[test]
    fn test_literals() {
        let triples = turtle("<s> <p> \"a\\\"b\"@EN .\n<s> <q> 42 .");
        match &triples[0].object {
            Term::Literal(l) => {
                assert_eq!(l.value, "a\"b");
                assert_eq!(l.language.as_deref(), Some("en"));
            },
            t => panic!("unexpected {:?}", t),
        }
        assert_eq!(triples[1].object, Term::typed("42", XSD_INTEGER));
    }

    #[test]
    fn test_generated_blank_nodes_stay_apart() {
        let g = Graph::from_triples(turtle("_:g1 <p> \"a\" . [ <q> \"b\" ] ."));
        let subjects: Vec<&Term> = g.iter().map(|t| &t.subject).collect();
        assert_eq!(subjects.len(), 2);
        assert_ne!(subjects[0], subjects[1]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_triples("ex:a ex:b ex:c .", "text/turtle", BASE).unwrap_err().status(), 400);
        assert!(parse_triples("?x <p> <o> .", "text/turtle", BASE).is_err());
        assert_eq!(crate::rdf::parse("", "application/rdf+xml", BASE).unwrap_err().status(), 415);
    }

    #[test]
    fn test_n3_formula() {
        let text = "@prefix solid: <http://www.w3.org/ns/solid/terms#>.\n<#p> solid:where { ?x <p> \"v\". }.";
        let triples = parse_n3(text, BASE).unwrap();
        assert_eq!(triples.len(), 1);
        match &triples[0].object {
            Term::Formula(inner) => {
                assert_eq!(inner.len(), 1);
                assert_eq!(inner[0].subject, Term::Variable("x".to_string()));
            },
            t => panic!("unexpected {:?}", t),
        }
    }

    #[test]
    fn test_turtle_reparses() {
        let mut g = Graph::new();
        let s = Term::iri("https://pod.example/c/");
        g.add(s.clone(), RDF_TYPE, Term::iri(&format!("{}BasicContainer", LDP)));
        g.add(s.clone(), &format!("{}contains", LDP), Term::iri("https://pod.example/c/a.ttl"));
        g.add(s.clone(), "http://ex.example/label", Term::string("quote \" and\nnewline"));
        let text = serialize_graph(&g, "text/turtle").unwrap();
        let back = Graph::from_triples(parse_triples(&text, "text/turtle", BASE).unwrap());
        assert_eq!(back, g);
    }

    #[test]
    fn test_non_canonical_literals_reparse() {
        let mut g = Graph::new();
        let s = Term::iri("https://pod.example/c/flags");
        g.add(s.clone(), "http://ex.example/on", Term::typed("TRUE", XSD_BOOLEAN));
        g.add(s.clone(), "http://ex.example/off", Term::typed("0", XSD_BOOLEAN));
        g.add(s.clone(), "http://ex.example/count", Term::typed("+01", XSD_INTEGER));
        g.add(s.clone(), "http://ex.example/bad", Term::typed("one", XSD_INTEGER));
        for ct in ["text/turtle", "text/n3", "application/n-triples"].iter() {
            let text = serialize_graph(&g, ct).unwrap();
            let back = Graph::from_triples(parse_triples(&text, "text/turtle", BASE).unwrap());
            assert_eq!(back, g, "{} output {}", ct, text);
        }
    }

    #[test]
    fn test_json_ld_compact_context() {
        let text = r##"{
            "@context": { "ex": "http://ex.example/ns#", "name": "http://ex.example/ns#name" },
            "@id": "#me",
            "@type": "ex:Person",
            "name": "Alice"
        }"##;
        let g = Graph::from_triples(parse_triples(text, "application/ld+json", "https://pod.example/card").unwrap());
        assert_eq!(g.len(), 2);
        let me = Term::iri("https://pod.example/card#me");
        assert!(g.contains(&Triple::new(me.clone(), Term::iri(RDF_TYPE), Term::iri("http://ex.example/ns#Person"))));
        assert!(g.contains(&Triple::new(me, Term::iri("http://ex.example/ns#name"), Term::string("Alice"))));
    }

    #[test]
    fn test_json_ld_written_reads_back() {
        let g = Graph::from_triples(turtle("<a> a <T>; <p> \"x\"@en, <b> ."));
        let text = serialize_graph(&g, "application/ld+json").unwrap();
        let back = Graph::from_triples(parse_triples(&text, "application/ld+json", BASE).unwrap());
        assert_eq!(back, g);
    }
}
