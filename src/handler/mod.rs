//! Per-method request handlers.
//!
//! A constructor chosen by method name inspects the exchange and returns a
//! concrete [RequestKind](RequestKind). The kind declares the access modes
//! it needs and, once those are granted, performs the operation.

use std::io::Read;

use log::debug;
use tiny_http::Method;

use crate::arg::Settings;
use crate::auth::wac::{
    Mode,
    Wac,
};
use crate::auth::Credentials;
use crate::error::{
    RequestError,
    RequestErrorType,
};
use crate::patch::PatchObject;
use crate::rdf::LDP;
use crate::request::RequestHeaders;
use crate::response::RequestResult;
use crate::store::{
    Resource,
    Store,
};
use crate::target::Target;
use crate::view::View;

pub mod copy;
pub mod delete;
pub mod get;
pub mod options;
pub mod patch;
pub mod put;

/// State shared by the steps of one request.
pub struct Exchange<'a> {
    pub settings: &'a Settings,
    pub store: &'a dyn Store,
    pub view: &'a dyn View,
    pub method: Method,
    pub target: Target,
    pub resource: Resource,
    pub headers: &'a RequestHeaders,
    pub credentials: Credentials,
    pub body: &'a mut dyn Read,
    pub body_length: Option<usize>,
}

impl<'a> Exchange<'a> {
    pub fn wac(&self) -> Wac<'_> {
        Wac::new(self.store)
    }

    /// The whole request body, checked against the declared length.
    pub fn read_body(&mut self) -> Result<Vec<u8>, RequestError> {
        let mut v = vec!();
        match self.body.read_to_end(&mut v) {
            Ok(_) => {},
            Err(e) => {
                return Err(RequestError::new(RequestErrorType::ReadError, &format!("cannot read request body: {}", e)));
            },
        };
        if let Some(n) = self.body_length {
            if n != v.len() {
                return Err(RequestError::new(
                    RequestErrorType::ReadError,
                    &format!("body length {} does not match declared {}", v.len(), n),
                ));
            }
        }
        Ok(v)
    }

    pub fn read_body_text(&mut self) -> Result<String, RequestError> {
        match String::from_utf8(self.read_body()?) {
            Ok(v) => Ok(v),
            Err(_) => Err(RequestError::bad_request("request body is not valid utf-8")),
        }
    }
}

/// Secondary selection of GET and HEAD.
#[derive(Clone, Debug, PartialEq)]
pub enum GetKind {
    Missing,
    /// The URL names a container without its trailing slash.
    Redirect(String),
    /// A container's `index.html` served for browsers.
    Index(Target),
    Listing(String),
    Viewer,
    Range(u64, u64),
    Unsatisfiable,
    Translate(String),
    Plain,
}

pub enum RequestKind {
    Get(GetKind),
    Head(GetKind),
    Put,
    Post,
    Patch(PatchObject),
    Delete,
    Copy(Target),
    Options,
}

type Constructor = fn(&mut Exchange) -> Result<RequestKind, RequestError>;

const METHODS: [(&str, Constructor); 8] = [
    ("GET", get::select_get),
    ("HEAD", get::select_head),
    ("PUT", put::select_put),
    ("POST", put::select_post),
    ("PATCH", patch::select),
    ("DELETE", delete::select),
    ("COPY", copy::select),
    ("OPTIONS", options::select),
];

/// The handler for the request method, 405 for anything unknown.
pub fn select(ex: &mut Exchange) -> Result<RequestKind, RequestError> {
    let name = ex.method.to_string().to_ascii_uppercase();
    for (m, constructor) in METHODS.iter() {
        if *m == name {
            return constructor(ex);
        }
    }
    Err(RequestError::new(RequestErrorType::MethodNotAllowed, &format!("method {} not supported", name)))
}

impl RequestKind {
    /// Modes the agent needs on the target. ACL resources always need control.
    pub fn required_modes(&self, target: &Target) -> Vec<Mode> {
        if matches!(self, RequestKind::Options) {
            return vec!();
        }
        if target.is_acl() {
            return vec!(Mode::Control);
        }
        match self {
            RequestKind::Get(_) | RequestKind::Head(_) => vec!(Mode::Read),
            RequestKind::Put => vec!(Mode::Write),
            RequestKind::Post => vec!(Mode::Append),
            RequestKind::Patch(p) => p.required_modes(),
            RequestKind::Delete => vec!(Mode::Write),
            RequestKind::Copy(_) => vec!(Mode::Write),
            RequestKind::Options => vec!(),
        }
    }

    pub fn is_read(&self) -> bool {
        match self {
            RequestKind::Get(_) | RequestKind::Head(_) => true,
            _ => false,
        }
    }

    pub fn perform(self, ex: &mut Exchange) -> Result<RequestResult, RequestError> {
        match self {
            RequestKind::Get(kind) => get::perform(ex, kind),
            RequestKind::Head(kind) => get::perform(ex, kind),
            RequestKind::Put => put::perform_put(ex),
            RequestKind::Post => put::perform_post(ex),
            RequestKind::Patch(p) => patch::perform(ex, p),
            RequestKind::Delete => delete::perform(ex),
            RequestKind::Copy(source) => copy::perform(ex, source),
            RequestKind::Options => options::perform(ex),
        }
    }
}

fn etag_matches(list: &str, etag: Option<&str>) -> bool {
    let etag = match etag {
        Some(v) => v.trim_start_matches("W/"),
        None => return false,
    };
    list.split(',').any(|t| {
        let t = t.trim();
        t == "*" || t.trim_start_matches("W/") == etag
    })
}

/// Evaluate `If-Match` and `If-None-Match`. For reads a matching
/// `If-None-Match` yields the 304 to send instead.
pub fn preconditions(ex: &Exchange, read: bool) -> Result<Option<RequestResult>, RequestError> {
    let etag = ex.resource.etag();
    if let Some(v) = ex.headers.get("If-Match") {
        let ok = if v.trim() == "*" {
            ex.resource.exists
        } else {
            etag_matches(v, etag.as_deref())
        };
        if !ok {
            return Err(RequestError::new(RequestErrorType::PreconditionFailed, "If-Match does not match"));
        }
    }
    if let Some(v) = ex.headers.get("If-None-Match") {
        let matched = if v.trim() == "*" {
            ex.resource.exists
        } else {
            etag_matches(v, etag.as_deref())
        };
        if matched {
            if read {
                debug!("not modified: {}", ex.target.url);
                let mut r = RequestResult::new(304);
                if let Some(e) = &etag {
                    r.add_header("ETag", e);
                }
                return Ok(Some(r));
            }
            return Err(RequestError::new(RequestErrorType::PreconditionFailed, "If-None-Match matches"));
        }
    }
    Ok(None)
}

/// `ETag`, `Last-Modified` and LDP type links of an existing resource.
pub fn resource_headers(resource: &Resource, r: &mut RequestResult) {
    if !resource.exists {
        return;
    }
    if let Some(e) = resource.etag() {
        r.add_header("ETag", &e);
    }
    if let Some(m) = resource.last_modified() {
        r.add_header("Last-Modified", &m);
    }
    r.add_header("Link", &format!("<{}Resource>; rel=\"type\"", LDP));
    if resource.is_container {
        r.add_header("Link", &format!("<{}Container>; rel=\"type\"", LDP));
        r.add_header("Link", &format!("<{}BasicContainer>; rel=\"type\"", LDP));
    }
}

/// The created (201) or replaced (204) answer of a write.
pub fn written(target: &Target, existed: bool) -> RequestResult {
    if existed {
        return RequestResult::new(204);
    }
    let mut r = RequestResult::new(201);
    r.add_header("Location", &target.location());
    r
}

#[cfg(test)]
mod tests {
    use super::etag_matches;

    #[test]
    fn test_etag_lists() {
        assert!(etag_matches("\"a\", \"b\"", Some("\"b\"")));
        assert!(etag_matches("W/\"b\"", Some("\"b\"")));
        assert!(etag_matches("*", Some("\"b\"")));
        assert!(!etag_matches("\"a\"", Some("\"b\"")));
        assert!(!etag_matches("\"a\"", None));
    }
}
