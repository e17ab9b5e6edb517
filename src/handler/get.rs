use std::time::UNIX_EPOCH;

use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use log::{
    debug,
    warn,
};

use crate::error::{
    RequestError,
    RequestErrorType,
};
use crate::rdf::{
    self,
    Graph,
    Term,
    DCTERMS,
    LDP,
    RDF_TYPE,
    STAT,
    TRANSLATABLE_TYPES,
    XSD_DATETIME,
    XSD_DECIMAL,
    XSD_INTEGER,
};
use crate::response::{
    RequestResult,
    ResultBody,
};
use crate::store::{
    Container,
    Resource,
};
use super::{
    resource_headers,
    Exchange,
    GetKind,
    RequestKind,
};

const TEXT_HTML: &str = "text/html";
const MEDIA_TYPES: &str = "http://www.w3.org/ns/iana/media-types/";

pub fn select_get(ex: &mut Exchange) -> Result<RequestKind, RequestError> {
    Ok(RequestKind::Get(choose(ex)?))
}

pub fn select_head(ex: &mut Exchange) -> Result<RequestKind, RequestError> {
    Ok(RequestKind::Head(choose(ex)?))
}

fn not_acceptable(ex: &Exchange) -> RequestError {
    RequestError::new(
        RequestErrorType::NotAcceptable,
        &format!("cannot serve {} as requested", ex.target.url),
    )
}

fn choose(ex: &Exchange) -> Result<GetKind, RequestError> {
    if !ex.resource.exists {
        if !ex.target.is_container() {
            let c = ex.target.as_container();
            if ex.store.exists(&c)? {
                return Ok(GetKind::Redirect(c.location()));
            }
        }
        return Ok(GetKind::Missing);
    }
    let accept = &ex.target.accept;
    let browser = ex.settings.data_browser;

    if ex.resource.is_container {
        let mut available: Vec<&str> = TRANSLATABLE_TYPES.to_vec();
        available.push(TEXT_HTML);
        match accept.preferred(&available).as_deref() {
            Some(TEXT_HTML) => {
                let index = ex.target.child("index.html")?;
                if ex.store.exists(&index)? {
                    return Ok(GetKind::Index(index));
                }
                if browser {
                    return Ok(GetKind::Viewer);
                }
                match accept.preferred(&TRANSLATABLE_TYPES) {
                    Some(ct) => return Ok(GetKind::Listing(ct)),
                    None => return Err(not_acceptable(ex)),
                }
            },
            Some(ct) => return Ok(GetKind::Listing(ct.to_string())),
            None => return Err(not_acceptable(ex)),
        }
    }

    let stored = rdf::essence(&ex.resource.content_type);
    if !rdf::is_rdf(&stored) {
        if accept.quality(&stored) <= 0.0 {
            return Err(not_acceptable(ex));
        }
        return Ok(plain_or_range(ex));
    }
    let mut available: Vec<&str> = vec!(stored.as_str());
    if rdf::is_translatable(&stored) {
        for t in TRANSLATABLE_TYPES.iter() {
            if *t != stored {
                available.push(t);
            }
        }
    }
    if browser {
        available.push(TEXT_HTML);
    }
    match accept.preferred(&available) {
        None => Err(not_acceptable(ex)),
        Some(ct) if ct == TEXT_HTML => Ok(GetKind::Viewer),
        Some(ct) if ct == stored => Ok(plain_or_range(ex)),
        Some(ct) => Ok(GetKind::Translate(ct)),
    }
}

fn plain_or_range(ex: &Exchange) -> GetKind {
    let header = match ex.headers.get("Range") {
        Some(v) => v,
        None => return GetKind::Plain,
    };
    match parse_range(header, ex.resource.size) {
        Some(Some((start, end))) => GetKind::Range(start, end),
        Some(None) => GetKind::Unsatisfiable,
        None => GetKind::Plain,
    }
}

/// A single `bytes=` range against `size`: None to ignore the header,
/// Some(None) when unsatisfiable, else the inclusive bounds.
pub fn parse_range(header: &str, size: u64) -> Option<Option<(u64, u64)>> {
    let spec = header.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let mut parts = spec.splitn(2, '-');
    let first = parts.next()?.trim();
    let last = parts.next()?.trim();
    if first.is_empty() {
        let n: u64 = last.parse().ok()?;
        if n == 0 || size == 0 {
            return Some(None);
        }
        return Some(Some((size - std::cmp::min(n, size), size - 1)));
    }
    let start: u64 = first.parse().ok()?;
    let end: u64 = if last.is_empty() {
        u64::MAX
    } else {
        last.parse().ok()?
    };
    if end < start {
        return None;
    }
    if start >= size {
        return Some(None);
    }
    Some(Some((start, std::cmp::min(end, size - 1))))
}

fn describe(g: &mut Graph, r: &Resource) {
    let node = Term::iri(&r.target.location());
    g.add(node.clone(), RDF_TYPE, Term::iri(&format!("{}Resource", LDP)));
    if r.is_container {
        g.add(node.clone(), RDF_TYPE, Term::iri(&format!("{}Container", LDP)));
        g.add(node.clone(), RDF_TYPE, Term::iri(&format!("{}BasicContainer", LDP)));
    } else if !r.content_type.is_empty() {
        let ct = rdf::essence(&r.content_type);
        g.add(node.clone(), RDF_TYPE, Term::iri(&format!("{}{}#Resource", MEDIA_TYPES, ct)));
    }
    if let Some(m) = r.modified {
        let v = DateTime::<Utc>::from(m).to_rfc3339_opts(SecondsFormat::Secs, true);
        g.add(node.clone(), &format!("{}modified", DCTERMS), Term::typed(&v, XSD_DATETIME));
        if let Ok(d) = m.duration_since(UNIX_EPOCH) {
            g.add(node.clone(), &format!("{}mtime", STAT), Term::typed(&format!("{}.{:03}", d.as_secs(), d.subsec_millis()), XSD_DECIMAL));
        }
    }
    g.add(node, &format!("{}size", STAT), Term::typed(&r.size.to_string(), XSD_INTEGER));
}

/// The container described as RDF, merged with its `.meta` triples.
pub fn listing_graph(ex: &Exchange) -> Result<Graph, RequestError> {
    let mut c = Container::new(ex.resource.clone());
    ex.store.load_contents_details(&mut c)?;
    let me = Term::iri(&ex.target.location());
    let mut g = Graph::new();
    describe(&mut g, &ex.resource);
    for r in c.resources.iter() {
        if r.target.is_auxiliary() {
            continue;
        }
        g.add(me.clone(), &format!("{}contains", LDP), Term::iri(&r.target.location()));
        describe(&mut g, r);
    }
    if let Some(meta) = ex.target.meta_target() {
        let m = ex.store.resource(&meta)?;
        if m.exists {
            match ex.store.load_parsed_graph(&m) {
                Ok(v) => g.extend(&v),
                Err(e) => warn!("ignoring unreadable {}: {}", meta.url, e),
            }
        }
    }
    debug!("listing of {} has {} triples", ex.target.url, g.len());
    Ok(g)
}

fn stream(ex: &Exchange, r: &Resource, status: u16, range: Option<(u64, u64)>) -> Result<RequestResult, RequestError> {
    let reader = ex.store.create_read_stream(r, range)?;
    let length = match range {
        Some((start, end)) => end - start + 1,
        None => r.size,
    };
    let mut res = RequestResult::new(status);
    res.add_header("Content-Type", &r.content_type);
    res.add_header("Accept-Ranges", "bytes");
    res.body = ResultBody::Stream(reader, length);
    Ok(res)
}

pub fn perform(ex: &mut Exchange, kind: GetKind) -> Result<RequestResult, RequestError> {
    let mut res = match kind {
        GetKind::Missing => {
            return Err(RequestError::not_found(&format!("{} not found", ex.target.url)));
        },
        GetKind::Redirect(location) => {
            let mut r = RequestResult::new(301);
            r.add_header("Location", &location);
            return Ok(r);
        },
        GetKind::Index(index) => {
            let r = ex.store.resource(&index)?;
            let mut res = stream(ex, &r, 200, None)?;
            resource_headers(&r, &mut res);
            res.add_header("Vary", "Accept");
            return Ok(res);
        },
        GetKind::Listing(ct) => {
            let g = listing_graph(ex)?;
            RequestResult::with_body(200, &ct, rdf::serialize(&g, &ct)?.into_bytes())
        },
        GetKind::Viewer => {
            let g = if ex.resource.is_container {
                listing_graph(ex)?
            } else {
                ex.store.load_parsed_graph(&ex.resource)?
            };
            let html = ex.view.data_browser(&ex.target, &g)?;
            RequestResult::with_body(200, "text/html; charset=utf-8", html.into_bytes())
        },
        GetKind::Translate(ct) => {
            let g = ex.store.load_parsed_graph(&ex.resource)?;
            RequestResult::with_body(200, &ct, rdf::serialize(&g, &ct)?.into_bytes())
        },
        GetKind::Range(start, end) => {
            let mut r = stream(ex, &ex.resource, 206, Some((start, end)))?;
            r.add_header("Content-Range", &format!("bytes {}-{}/{}", start, end, ex.resource.size));
            r
        },
        GetKind::Unsatisfiable => {
            let mut r = RequestResult::new(416);
            r.add_header("Content-Range", &format!("bytes */{}", ex.resource.size));
            return Ok(r);
        },
        GetKind::Plain => stream(ex, &ex.resource, 200, None)?,
    };
    resource_headers(&ex.resource, &mut res);
    res.add_header("Vary", "Accept");
    Ok(res)
}
