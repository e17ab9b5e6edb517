use std::io::{
    empty,
    Cursor,
    Read,
};
use std::str::FromStr;

use ascii::AsciiString;
use log::{
    debug,
    warn,
};
use tiny_http::{
    Header,
    HeaderField,
    Request,
    Response,
    StatusCode,
};

use crate::accept::Accept;
use crate::arg::Settings;
use crate::error::RequestError;
use crate::target::Target;
use crate::view::View;

pub const PROBLEM_JSON: &str = "application/problem+json";

/// Methods this server implements.
pub const ALLOW: &str = "OPTIONS, HEAD, GET, PATCH, POST, PUT, DELETE, COPY";

pub enum ResultBody {
    Empty,
    Bytes(Vec<u8>),
    /// Reader and its exact length.
    Stream(Box<dyn Read + Send>, u64),
}

impl ResultBody {
    pub fn len(&self) -> u64 {
        match self {
            ResultBody::Empty => 0,
            ResultBody::Bytes(v) => v.len() as u64,
            ResultBody::Stream(_, n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything needed to answer a request, independent of the HTTP server.
pub struct RequestResult {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResultBody,
}

impl RequestResult {
    pub fn new(status: u16) -> RequestResult {
        RequestResult {
            status,
            headers: vec!(),
            body: ResultBody::Empty,
        }
    }

    pub fn with_body(status: u16, content_type: &str, body: Vec<u8>) -> RequestResult {
        let mut r = RequestResult::new(status);
        r.add_header("Content-Type", content_type);
        r.body = ResultBody::Bytes(body);
        r
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// First value of `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// All values of `name`.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str()).collect()
    }

    /// Drain the body into memory.
    pub fn body_bytes(&mut self) -> Vec<u8> {
        let body = std::mem::replace(&mut self.body, ResultBody::Empty);
        match body {
            ResultBody::Empty => vec!(),
            ResultBody::Bytes(v) => v,
            ResultBody::Stream(mut r, _) => {
                let mut v = vec!();
                if let Err(e) = r.read_to_end(&mut v) {
                    warn!("cannot read response body: {}", e);
                }
                v
            },
        }
    }
}

/// CORS headers, sent with every response.
pub fn origin_headers(origin: Option<&str>) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = vec!();
    let allow_origin = match origin {
        Some(v) => v.to_string(),
        None => "*".to_string(),
    };
    headers.push(("Access-Control-Allow-Origin".to_string(), allow_origin));
    headers.push(("Access-Control-Allow-Credentials".to_string(), "true".to_string()));
    headers.push(("Access-Control-Allow-Methods".to_string(), ALLOW.to_string()));
    headers.push((
        "Access-Control-Allow-Headers".to_string(),
        "Authorization, Accept, Content-Type, If-Match, If-None-Match, Link, Location, Origin, Range, Slug, Source".to_string(),
    ));
    headers.push((
        "Access-Control-Expose-Headers".to_string(),
        "Accept-Patch, Accept-Post, Allow, Content-Range, ETag, Last-Modified, Link, Location, MS-Author-Via, WAC-Allow, WWW-Authenticate".to_string(),
    ));
    if origin.is_some() {
        headers.push(("Vary".to_string(), "Origin".to_string()));
    }
    let server_header_v = format!("podd/{}, tiny_http (Rust)", env!("CARGO_PKG_VERSION"));
    headers.push(("Server".to_string(), server_header_v));
    headers
}

/// `Link` headers naming the ACL and metadata resources of `target`.
pub fn link_headers(target: &Target) -> Vec<(String, String)> {
    vec!(
        ("Link".to_string(), format!("<{}>; rel=\"acl\"", target.acl_url())),
        ("Link".to_string(), format!("<{}>; rel=\"describedBy\"", target.meta_url())),
    )
}

/// Convert a failed request into a response, as HTML for browsers and
/// `application/problem+json` for everyone else.
pub fn error_result(e: &RequestError, accept: &Accept, settings: &Settings, view: &dyn View) -> RequestResult {
    let status = e.status();
    let html = accept.names("text/html")
        && accept.preferred(&[PROBLEM_JSON, "text/html"]).as_deref() == Some("text/html");
    let mut r = if html {
        RequestResult::with_body(status, "text/html; charset=utf-8", view.error_page(e).into_bytes())
    } else {
        let problem = serde_json::json!({
            "type": "about:blank",
            "title": e.typ.title(),
            "status": status,
            "detail": e.message(),
        });
        RequestResult::with_body(status, PROBLEM_JSON, problem.to_string().into_bytes())
    };
    if status == 401 {
        let challenge = format!("Bearer realm=\"{}\", scope=\"openid webid\"", settings.server_uri);
        r.add_header("WWW-Authenticate", &challenge);
    }
    if status == 405 {
        r.add_header("Allow", ALLOW);
    }
    r
}

fn header(name: &str, value: &str) -> Option<Header> {
    let field = match HeaderField::from_str(name) {
        Ok(v) => v,
        Err(_) => return None,
    };
    match AsciiString::from_ascii(value) {
        Ok(v) => Some(Header {
            field,
            value: v,
        }),
        Err(_) => None,
    }
}

/// Write `r` to the client through tiny_http.
pub fn exec_response(req: Request, r: RequestResult) {
    let mut headers: Vec<Header> = vec!();
    for (k, v) in r.headers.iter() {
        match header(k, v) {
            Some(h) => headers.push(h),
            None => warn!("dropping unencodable header {}: {}", k, v),
        }
    }
    let length = match r.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case("Content-Length")) {
        Some((_, v)) => usize::from_str(v).ok(),
        None => Some(r.body.len() as usize),
    };
    let reader: Box<dyn Read + Send> = match r.body {
        ResultBody::Empty => Box::new(empty()),
        ResultBody::Bytes(v) => Box::new(Cursor::new(v)),
        ResultBody::Stream(s, _) => s,
    };
    let res = Response::new(StatusCode(r.status), headers, reader, length, None);
    match req.respond(res) {
        Ok(_) => {},
        Err(e) => {
            debug!("client went away: {}", e);
        },
    }
}
