//! Resolution of an incoming request into the resource it addresses.
//!
//! A [Target](Target) is built without any I/O. The canonical URL always
//! uses the configured server base (or, in multiuser mode, one of its
//! subdomains), never an arbitrary client-supplied `Host`.

use percent_encoding::percent_decode_str;
use tiny_http::Method;
use url::Url;

use log::debug;

use crate::accept::Accept;
use crate::arg::Settings;
use crate::error::RequestError;
use crate::request::RequestHeaders;
use crate::rdf::LDP;

pub const SUFFIX_ACL: &str = ".acl";
pub const SUFFIX_META: &str = ".meta";

/// The resolved, canonical identity of the addressed resource.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub url: Url,
    pub name: String,
    pub body_content_type: Option<String>,
    pub accept: Accept,
}

fn last_segment(path: &str) -> String {
    match path.trim_end_matches('/').rsplit('/').next() {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

impl Target {
    /// A target for a server-internal lookup: no body, no negotiation.
    pub fn from_url(url: Url) -> Target {
        let name = last_segment(url.path());
        Target {
            url,
            name,
            body_content_type: None,
            accept: Accept::default(),
        }
    }

    fn sibling(&self, url: &str) -> Option<Target> {
        match Url::parse(url) {
            Ok(u) => Some(Target::from_url(u)),
            Err(_) => None,
        }
    }

    /// URL without query or fragment.
    pub fn location(&self) -> String {
        let mut u = self.url.clone();
        u.set_query(None);
        u.set_fragment(None);
        u.to_string()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn hostname(&self) -> String {
        match self.url.host_str() {
            Some(v) => v.to_string(),
            None => String::new(),
        }
    }

    pub fn is_container(&self) -> bool {
        self.url.path().ends_with('/')
    }

    pub fn is_root(&self) -> bool {
        self.url.path() == "/"
    }

    pub fn is_acl(&self) -> bool {
        !self.is_container() && self.url.path().ends_with(SUFFIX_ACL)
    }

    pub fn is_meta(&self) -> bool {
        !self.is_container() && !self.is_acl() && self.url.path().ends_with(SUFFIX_META)
    }

    /// ACL or metadata housekeeping file.
    pub fn is_auxiliary(&self) -> bool {
        self.is_acl() || self.is_meta()
    }

    pub fn acl_url(&self) -> String {
        if self.is_acl() {
            return self.location();
        }
        format!("{}{}", self.location(), SUFFIX_ACL)
    }

    pub fn meta_url(&self) -> String {
        if self.is_meta() {
            return self.location();
        }
        format!("{}{}", self.location(), SUFFIX_META)
    }

    pub fn acl_target(&self) -> Option<Target> {
        self.sibling(&self.acl_url())
    }

    pub fn meta_target(&self) -> Option<Target> {
        self.sibling(&self.meta_url())
    }

    /// The resource an ACL protects or a metadata file describes; the target itself otherwise.
    pub fn subject(&self) -> Target {
        let loc = self.location();
        let base = if self.is_acl() {
            loc.strip_suffix(SUFFIX_ACL)
        } else if self.is_meta() {
            loc.strip_suffix(SUFFIX_META)
        } else {
            None
        };
        match base.and_then(|b| self.sibling(b)) {
            Some(t) => t,
            None => self.clone(),
        }
    }

    /// The enclosing container, None at the root.
    pub fn parent(&self) -> Option<Target> {
        if self.is_root() {
            return None;
        }
        let path = self.url.path().trim_end_matches('/');
        let cut = match path.rfind('/') {
            Some(v) => v,
            None => return None,
        };
        let mut u = self.url.clone();
        u.set_query(None);
        u.set_fragment(None);
        u.set_path(&path[..cut + 1]);
        Some(Target::from_url(u))
    }

    /// The same target with a trailing slash, for a URL that names a container.
    pub fn as_container(&self) -> Target {
        if self.is_container() {
            return self.clone();
        }
        let mut t = self.clone();
        let path = format!("{}/", self.url.path());
        t.url.set_path(&path);
        t.name = last_segment(&path);
        t
    }

    /// A child of this container.
    pub fn child(&self, name: &str) -> Result<Target, RequestError> {
        match self.url.join(name) {
            Ok(u) => Ok(Target::from_url(u)),
            Err(e) => Err(RequestError::bad_request(&format!("invalid name {}: {}", name, e))),
        }
    }
}

/// Reject parent-directory and separator-smuggling segments, raw or decoded.
pub fn check_segments(path: &str) -> Result<(), RequestError> {
    for segment in path.split('/') {
        if segment == ".." || segment == "." {
            return Err(RequestError::bad_request("disallowed path segment"));
        }
        let decoded = match percent_decode_str(segment).decode_utf8() {
            Ok(v) => v,
            Err(_) => {
                return Err(RequestError::bad_request("path is not valid utf-8"));
            },
        };
        if decoded == ".." || decoded == "." {
            return Err(RequestError::bad_request("disallowed path segment"));
        }
        if decoded.contains('/') || decoded.contains('\\') || decoded.contains('\0') {
            return Err(RequestError::bad_request("disallowed character in path segment"));
        }
        if decoded.contains('$') {
            return Err(RequestError::bad_request("'$' is reserved in resource names"));
        }
    }
    Ok(())
}

/// The rel="type" URIs of a `Link` request header.
pub fn link_types(header: Option<&str>) -> Vec<String> {
    let mut types = vec!();
    let header = match header {
        Some(v) => v,
        None => return types,
    };
    for link in header.split(',') {
        let mut parts = link.split(';');
        let uri = match parts.next() {
            Some(v) => v.trim().trim_start_matches('<').trim_end_matches('>').to_string(),
            None => continue,
        };
        for param in parts {
            let mut kv = param.splitn(2, '=');
            let k = kv.next().unwrap_or("").trim();
            let v = kv.next().unwrap_or("").trim().trim_matches('"');
            if k.eq_ignore_ascii_case("rel") && v.split_whitespace().any(|r| r == "type") {
                types.push(uri.clone());
            }
        }
    }
    types
}

/// Whether a `Link` header asks for the resource to be a container.
pub fn wants_container(header: Option<&str>) -> bool {
    let basic = format!("{}BasicContainer", LDP);
    let plain = format!("{}Container", LDP);
    link_types(header).iter().any(|t| *t == basic || *t == plain)
}

fn host_base(headers: &RequestHeaders, settings: &Settings) -> Url {
    let mut base = settings.server_uri.clone();
    if !settings.multiuser {
        return base;
    }
    let server_host = match settings.server_uri.host_str() {
        Some(v) => v.to_ascii_lowercase(),
        None => return base,
    };
    let requested = match headers.get("Host") {
        Some(v) => v.split(':').next().unwrap_or("").to_ascii_lowercase(),
        None => return base,
    };
    if requested == server_host || requested.ends_with(&format!(".{}", server_host)) {
        if base.set_host(Some(&requested)).is_err() {
            debug!("host {} rejected, using {}", requested, server_host);
        }
    }
    base
}

/// Build the target of a request.
pub fn resolve(method: &Method, raw_url: &str, headers: &RequestHeaders, settings: &Settings) -> Result<Target, RequestError> {
    let mut local = raw_url.to_string();
    if *method == Method::Options && raw_url == "*" {
        local = "/".to_string();
    }
    if !local.starts_with('/') {
        match Url::parse(raw_url) {
            Ok(u) => {
                local = u.path().to_string();
                if let Some(q) = u.query() {
                    local.push('?');
                    local.push_str(q);
                }
            },
            Err(_) => {
                return Err(RequestError::bad_request(&format!("invalid request target {}", raw_url)));
            },
        }
    }
    let raw_path = match local.find('?') {
        Some(p) => &local[..p],
        None => &local[..],
    };
    check_segments(raw_path)?;

    let base = host_base(headers, settings);
    let mut url = match base.join(&local) {
        Ok(v) => v,
        Err(e) => {
            return Err(RequestError::bad_request(&format!("invalid request target {}: {}", raw_url, e)));
        },
    };
    url.set_fragment(None);
    check_segments(url.path())?;

    let container_hint = match method {
        Method::Put | Method::Post => wants_container(headers.get("Link")),
        _ => false,
    };
    if container_hint && *method == Method::Put && !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    let name = last_segment(url.path());
    Ok(Target {
        url,
        name,
        body_content_type: headers.get("Content-Type").map(|v| v.to_string()),
        accept: Accept::parse(headers.get("Accept"), headers.get("Accept-Charset")),
    })
}
