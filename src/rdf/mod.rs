//! A small RDF data model: terms, triples and a set-backed graph.
//!
//! Resources are parsed into a [Graph](Graph) when they have to be
//! understood by the server (ACL evaluation, PATCH, serialization
//! translation, container metadata) and written back as text.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::RequestError;

/// Reading and writing through the oxigraph parsers and serializers.
pub mod syntax;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const LDP: &str = "http://www.w3.org/ns/ldp#";
pub const ACL: &str = "http://www.w3.org/ns/auth/acl#";
pub const FOAF: &str = "http://xmlns.com/foaf/0.1/";
pub const VCARD: &str = "http://www.w3.org/2006/vcard/ns#";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const STAT: &str = "http://www.w3.org/ns/posix/stat#";
pub const SOLID: &str = "http://www.w3.org/ns/solid/terms#";

pub const TEXT_TURTLE: &str = "text/turtle";
pub const TEXT_N3: &str = "text/n3";
pub const N_TRIPLES: &str = "application/n-triples";
pub const JSON_LD: &str = "application/ld+json";
pub const RDF_XML: &str = "application/rdf+xml";

/// Serializations the server can both read and write.
pub const TRANSLATABLE_TYPES: [&str; 4] = [
    TEXT_TURTLE,
    JSON_LD,
    N_TRIPLES,
    TEXT_N3,
];

/// Strip parameters and normalize case, `text/turtle; charset=utf-8` -> `text/turtle`.
pub fn essence(content_type: &str) -> String {
    match content_type.split(';').next() {
        Some(v) => v.trim().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Whether the content type denotes an RDF serialization, translatable or not.
pub fn is_rdf(content_type: &str) -> bool {
    let e = essence(content_type);
    e == RDF_XML || TRANSLATABLE_TYPES.iter().any(|t| *t == e)
}

/// Whether the server can parse and produce the content type.
pub fn is_translatable(content_type: &str) -> bool {
    let e = essence(content_type);
    TRANSLATABLE_TYPES.iter().any(|t| *t == e)
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub value: String,
    pub datatype: String,
    pub language: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
    /// Query variable, only meaningful inside patches.
    Variable(String),
    /// N3 quoted graph, only meaningful inside patches.
    Formula(Vec<Triple>),
}

impl Term {
    pub fn iri(v: &str) -> Term {
        Term::Iri(v.to_string())
    }

    pub fn string(v: &str) -> Term {
        Term::Literal(Literal {
            value: v.to_string(),
            datatype: XSD_STRING.to_string(),
            language: None,
        })
    }

    pub fn typed(v: &str, datatype: &str) -> Term {
        Term::Literal(Literal {
            value: v.to_string(),
            datatype: datatype.to_string(),
            language: None,
        })
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        match self {
            Term::Variable(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(v) => write!(fmt, "?{}", v),
            Term::Formula(triples) => {
                fmt.write_str("{")?;
                for t in triples.iter() {
                    write!(fmt, " {}", t)?;
                }
                fmt.write_str(" }")
            },
            v => match syntax::to_term(v) {
                Ok(t) => write!(fmt, "{}", t),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Triple {
        Triple {
            subject,
            predicate,
            object,
        }
    }

    pub fn has_variables(&self) -> bool {
        self.subject.is_variable() || self.predicate.is_variable() || self.object.is_variable()
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// A set of triples. Duplicates are absorbed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph {
            triples: BTreeSet::new(),
        }
    }

    pub fn from_triples(triples: Vec<Triple>) -> Graph {
        let mut g = Graph::new();
        for t in triples {
            g.insert(t);
        }
        g
    }

    pub fn insert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn add(&mut self, subject: Term, predicate: &str, object: Term) {
        self.insert(Triple::new(subject, Term::iri(predicate), object));
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.triples.remove(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn extend(&mut self, other: &Graph) {
        for t in other.iter() {
            self.triples.insert(t.clone());
        }
    }

    /// Triples matching the pattern, `None` being a wildcard.
    pub fn matching<'a>(&'a self, s: Option<&'a Term>, p: Option<&'a Term>, o: Option<&'a Term>) -> impl Iterator<Item = &'a Triple> + 'a {
        self.triples.iter().filter(move |t| {
            s.map_or(true, |v| &t.subject == v)
                && p.map_or(true, |v| &t.predicate == v)
                && o.map_or(true, |v| &t.object == v)
        })
    }

    pub fn objects(&self, subject: &Term, predicate: &str) -> Vec<Term> {
        let p = Term::iri(predicate);
        self.matching(Some(subject), Some(&p), None).map(|t| t.object.clone()).collect()
    }

    pub fn subjects(&self, predicate: &str, object: &Term) -> Vec<Term> {
        let p = Term::iri(predicate);
        self.matching(None, Some(&p), Some(object)).map(|t| t.subject.clone()).collect()
    }
}

/// Parse `text` in the given serialization, resolving relative IRIs against `base`.
pub fn parse(text: &str, content_type: &str, base: &str) -> Result<Graph, RequestError> {
    if !is_translatable(content_type) {
        return Err(RequestError::new(
            crate::error::RequestErrorType::UnsupportedMediaType,
            &format!("cannot parse {}", essence(content_type)),
        ));
    }
    let triples = match essence(content_type).as_str() {
        TEXT_N3 => syntax::parse_n3(text, base)?,
        _ => syntax::parse_triples(text, content_type, base)?,
    };
    Ok(Graph::from_triples(triples))
}

/// Write `graph` in the given serialization.
pub fn serialize(graph: &Graph, content_type: &str) -> Result<String, RequestError> {
    if !is_translatable(content_type) {
        return Err(RequestError::new(
            crate::error::RequestErrorType::NotAcceptable,
            &format!("cannot serialize to {}", essence(content_type)),
        ));
    }
    syntax::serialize_graph(graph, content_type)
}
