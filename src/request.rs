use std::io::Read;

use log::{
    debug,
    error,
    info,
};
use tiny_http::{
    Method,
    Request,
};

use crate::accept::Accept;
use crate::arg::Settings;
use crate::auth::{
    authenticators,
    credentials,
    Authenticator,
};
use crate::error::RequestError;
use crate::handler::{
    self,
    preconditions,
    Exchange,
    RequestKind,
};
use crate::mapper::ResourceMapper;
use crate::response::{
    error_result,
    link_headers,
    origin_headers,
    RequestResult,
    ResultBody,
};
use crate::store::file::FileStore;
use crate::store::{
    Resource,
    Store,
};
use crate::target::{
    resolve,
    Target,
};
use crate::view::{
    HtmlView,
    View,
};

/// Request headers in arrival order. Lookups ignore case.
#[derive(Clone, Debug, Default)]
pub struct RequestHeaders {
    v: Vec<(String, String)>,
}

impl RequestHeaders {
    pub fn new() -> RequestHeaders {
        RequestHeaders {
            v: vec!(),
        }
    }

    pub fn push(&mut self, name: &str, value: &str) {
        self.v.push((name.to_string(), value.to_string()));
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.v.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn from_request(req: &Request) -> RequestHeaders {
        let mut headers = RequestHeaders::new();
        for h in req.headers() {
            headers.push(h.field.as_str().as_str(), h.value.as_str());
        }
        headers
    }
}

/// An incoming request, detached from the transport.
pub struct LdpRequest<'a> {
    pub method: Method,
    /// Request target as sent by the client, path and query.
    pub url: String,
    pub headers: RequestHeaders,
    pub body: &'a mut dyn Read,
    pub body_length: Option<usize>,
}

/// The server: settings, storage, authentication and rendering.
pub struct Ldp {
    settings: Settings,
    store: Box<dyn Store>,
    authenticators: Vec<Box<dyn Authenticator>>,
    view: Box<dyn View>,
}

impl Ldp {
    pub fn new(settings: Settings, store: Box<dyn Store>, view: Box<dyn View>) -> Ldp {
        let authenticators = authenticators(&settings);
        Ldp {
            settings,
            store,
            authenticators,
            view,
        }
    }

    /// A server storing files below `settings.root`.
    pub fn from_settings(settings: Settings) -> Result<Ldp, RequestError> {
        let mapper = ResourceMapper::new(settings.root.clone(), settings.server_uri.clone(), settings.multiuser);
        let store = FileStore::new(mapper);
        let view = match &settings.data_browser_path {
            Some(p) => HtmlView::with_browser(p)?,
            None => HtmlView::new(),
        };
        Ok(Ldp::new(settings, Box::new(store), Box::new(view)))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    fn process(&self, method: &Method, target: Target, headers: &RequestHeaders, body: &mut dyn Read, body_length: Option<usize>) -> Result<RequestResult, RequestError> {
        let credentials = credentials(&self.authenticators, headers)?;
        let resource = match self.store.resource(&target) {
            Ok(v) => v,
            Err(e) if *method == Method::Options => {
                debug!("options on {} without a stored resource: {}", target.url, e);
                Resource::absent(&target)
            },
            Err(e) => return Err(e),
        };
        let mut ex = Exchange {
            settings: &self.settings,
            store: self.store.as_ref(),
            view: self.view.as_ref(),
            method: method.clone(),
            target,
            resource,
            headers,
            credentials,
            body,
            body_length,
        };

        let kind = handler::select(&mut ex)?;
        let required = kind.required_modes(&ex.target);
        if !required.is_empty() {
            ex.wac().allow(&ex.target, &required, &ex.credentials)?;
        }
        let read = kind.is_read();
        let options = matches!(kind, RequestKind::Options);
        if !options {
            if let Some(r) = preconditions(&ex, read)? {
                return Ok(r);
            }
        }

        let mut res = kind.perform(&mut ex)?;
        if read {
            let v = ex.wac().wac_allow(&ex.target, &ex.credentials)?;
            res.add_header("WAC-Allow", &v);
        }
        Ok(res)
    }

    /// Answer one request. Every failure becomes an error response here.
    pub fn handle(&self, req: LdpRequest) -> RequestResult {
        let LdpRequest {
            method,
            url,
            headers,
            body,
            body_length,
        } = req;
        debug!("{} {} length {:?}", method, url, body_length);

        let (result, links) = match resolve(&method, &url, &headers, &self.settings) {
            Ok(target) => {
                let links = link_headers(&target);
                (self.process(&method, target, &headers, body, body_length), links)
            },
            Err(e) => (Err(e), vec!()),
        };
        let mut res = match result {
            Ok(v) => v,
            Err(e) => {
                if e.status() >= 500 {
                    error!("{} {}: {}", method, url, e);
                } else {
                    debug!("{} {}: {}", method, url, e);
                }
                let accept = Accept::parse(headers.get("Accept"), headers.get("Accept-Charset"));
                error_result(&e, &accept, &self.settings, self.view.as_ref())
            },
        };
        for (k, v) in links {
            res.add_header(&k, &v);
        }
        for (k, v) in origin_headers(headers.get("Origin")) {
            res.add_header(&k, &v);
        }
        if method == Method::Head {
            let length = res.body.len();
            res.body = ResultBody::Empty;
            if res.header("Content-Length").is_none() {
                res.add_header("Content-Length", &length.to_string());
            }
        }
        info!("{} {} -> {}", method, url, res.status);
        res
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;

    use tempfile::tempdir;
    use tiny_http::Method;
    use url::Url;

    use crate::arg::Settings;
    use crate::auth::wac::bootstrap_root_acl;
    use crate::rdf::{
        self,
        Term,
        Triple,
    };
    use crate::response::RequestResult;
    use super::{
        Ldp,
        LdpRequest,
        RequestHeaders,
    };

    const OWNER: &str = "https://alice.example/profile#me";
    const STRANGER: &str = "https://bob.example/profile#me";

    fn server(root: &Path) -> Ldp {
        let mut settings = Settings::with_root(root.to_path_buf(), Url::parse("https://pod.example/").unwrap());
        settings.webid_header = Some("X-WebID".to_string());
        let ldp = Ldp::from_settings(settings).unwrap();
        bootstrap_root_acl(ldp.store(), &ldp.settings().server_uri, OWNER).unwrap();
        ldp
    }

    fn call(ldp: &Ldp, method: Method, url: &str, headers: &[(&str, &str)], body: &[u8]) -> RequestResult {
        let mut h = RequestHeaders::new();
        for (k, v) in headers.iter() {
            h.push(k, v);
        }
        let mut cursor = Cursor::new(body.to_vec());
        ldp.handle(LdpRequest {
            method,
            url: url.to_string(),
            headers: h,
            body: &mut cursor,
            body_length: Some(body.len()),
        })
    }

    fn put_text(ldp: &Ldp, url: &str, body: &str) -> RequestResult {
        call(ldp, Method::Put, url, &[("X-WebID", OWNER), ("Content-Type", "text/plain")], body.as_bytes())
    }

    #[test]
    fn test_put_then_get() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());

        let r = put_text(&ldp, "/notes/a.txt", "hello");
        assert_eq!(r.status, 201);
        assert_eq!(r.header("Location"), Some("https://pod.example/notes/a.txt"));
        assert_eq!(put_text(&ldp, "/notes/a.txt", "hello").status, 204);

        let mut r = call(&ldp, Method::Get, "/notes/a.txt", &[], b"");
        assert_eq!(r.status, 200);
        assert_eq!(r.header("Content-Type"), Some("text/plain"));
        assert!(r.header("ETag").is_some());
        assert!(r.header("WAC-Allow").unwrap().contains("public=\"read\""));
        assert!(r.header_values("Link").iter().any(|l| l.contains("rel=\"acl\"")));
        assert_eq!(r.body_bytes(), b"hello".to_vec());
        assert!(d.path().join("notes").join("a.txt").is_file());
    }

    #[test]
    fn test_dollar_file_and_listing() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());

        let r = call(&ldp, Method::Put, "/doc", &[("X-WebID", OWNER), ("Content-Type", "text/turtle")], b"<#a> <#b> <#c> .");
        assert_eq!(r.status, 201);
        assert!(d.path().join("doc$.ttl").is_file());

        let r = call(&ldp, Method::Get, "/doc", &[("Accept", "text/turtle")], b"");
        assert_eq!(r.status, 200);
        assert_eq!(r.header("Content-Type"), Some("text/turtle"));

        let mut r = call(&ldp, Method::Get, "/", &[("Accept", "text/turtle")], b"");
        assert_eq!(r.status, 200);
        let listing = String::from_utf8(r.body_bytes()).unwrap();
        assert!(listing.contains("<https://pod.example/doc>"));
        assert!(!listing.contains("doc$"));
        assert!(!listing.contains("<https://pod.example/.acl>"));
    }

    #[test]
    fn test_write_needs_permission() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());

        let r = call(&ldp, Method::Put, "/a.txt", &[("Content-Type", "text/plain")], b"x");
        assert_eq!(r.status, 401);
        assert!(r.header("WWW-Authenticate").unwrap().starts_with("Bearer"));

        let r = call(&ldp, Method::Put, "/a.txt", &[("X-WebID", STRANGER), ("Content-Type", "text/plain")], b"x");
        assert_eq!(r.status, 403);
        assert!(!d.path().join("a.txt").exists());

        let r = call(&ldp, Method::Get, "/.acl", &[("X-WebID", STRANGER)], b"");
        assert_eq!(r.status, 403);
    }

    #[test]
    fn test_patch_conflict_leaves_resource() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        let owner = [("X-WebID", OWNER), ("Content-Type", "application/sparql-update")];

        let r = call(&ldp, Method::Put, "/data.ttl", &[("X-WebID", OWNER), ("Content-Type", "text/turtle")], b"<#a> <#b> <#c> .");
        assert_eq!(r.status, 201);
        let before = std::fs::read(d.path().join("data.ttl")).unwrap();

        let patch = "DELETE DATA { <https://pod.example/data.ttl#x> <https://pod.example/data.ttl#y> <https://pod.example/data.ttl#z> . }";
        let r = call(&ldp, Method::Patch, "/data.ttl", &owner, patch.as_bytes());
        assert_eq!(r.status, 409);
        assert_eq!(std::fs::read(d.path().join("data.ttl")).unwrap(), before);

        let patch = "INSERT DATA { <https://pod.example/data.ttl#a> <https://pod.example/data.ttl#b> \"d\" . }";
        let mut r = call(&ldp, Method::Patch, "/data.ttl", &owner, patch.as_bytes());
        assert_eq!(r.status, 200);
        assert_eq!(r.header("MS-Author-Via"), Some("SPARQL"));
        assert_eq!(r.body_bytes(), b"Patch applied successfully.\n".to_vec());

        let text = String::from_utf8(std::fs::read(d.path().join("data.ttl")).unwrap()).unwrap();
        let g = rdf::parse(&text, rdf::TEXT_TURTLE, "https://pod.example/data.ttl").unwrap();
        assert_eq!(g.len(), 2);
        assert!(g.contains(&Triple::new(
            Term::iri("https://pod.example/data.ttl#a"),
            Term::iri("https://pod.example/data.ttl#b"),
            Term::string("d"),
        )));
    }

    #[test]
    fn test_patch_creates_resource() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        let patch = "@prefix solid: <http://www.w3.org/ns/solid/terms#>.\n\
            <#patch> a solid:InsertDeletePatch; solid:inserts { <#s> <#p> <#o> . }.";
        let r = call(&ldp, Method::Patch, "/new.ttl", &[("X-WebID", OWNER), ("Content-Type", "text/n3")], patch.as_bytes());
        assert_eq!(r.status, 201);
        assert_eq!(r.header("Location"), Some("https://pod.example/new.ttl"));
        assert!(d.path().join("new.ttl").is_file());

        let r = call(&ldp, Method::Patch, "/new.ttl", &[("X-WebID", OWNER)], patch.as_bytes());
        assert_eq!(r.status, 415);
        let r = call(&ldp, Method::Patch, "/", &[("X-WebID", OWNER), ("Content-Type", "text/n3")], patch.as_bytes());
        assert_eq!(r.status, 405);
        assert!(r.header("Allow").is_some());
    }

    #[test]
    fn test_delete() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        let owner = [("X-WebID", OWNER)];

        assert_eq!(put_text(&ldp, "/c/x.txt", "x").status, 201);
        assert_eq!(call(&ldp, Method::Delete, "/c/", &owner, b"").status, 409);
        assert_eq!(call(&ldp, Method::Delete, "/c/x.txt", &owner, b"").status, 200);
        assert_eq!(call(&ldp, Method::Get, "/c/x.txt", &[], b"").status, 404);
        assert_eq!(call(&ldp, Method::Delete, "/c/x.txt", &owner, b"").status, 404);
        assert_eq!(call(&ldp, Method::Delete, "/c/", &owner, b"").status, 200);
        assert!(!d.path().join("c").exists());

        assert_eq!(call(&ldp, Method::Delete, "/", &owner, b"").status, 403);
        assert_eq!(call(&ldp, Method::Delete, "/.acl", &owner, b"").status, 403);
    }

    #[test]
    fn test_delete_takes_acl_along() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        let owner = [("X-WebID", OWNER)];

        assert_eq!(put_text(&ldp, "/a.txt", "x").status, 201);
        let acl = format!(
            "@prefix acl: <http://www.w3.org/ns/auth/acl#>.\n\
            <#o> a acl:Authorization; acl:agent <{}>; acl:accessTo <a.txt>; acl:mode acl:Write .",
            OWNER,
        );
        let r = call(&ldp, Method::Put, "/a.txt.acl", &[("X-WebID", OWNER), ("Content-Type", "text/turtle")], acl.as_bytes());
        assert_eq!(r.status, 201);
        assert!(d.path().join("a.txt.acl").is_file());

        assert_eq!(call(&ldp, Method::Delete, "/a.txt", &owner, b"").status, 200);
        assert!(!d.path().join("a.txt.acl").exists());
    }

    #[test]
    fn test_post_slug() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        let headers = [("X-WebID", OWNER), ("Content-Type", "text/plain"), ("Slug", "note")];

        let a = call(&ldp, Method::Post, "/", &headers, b"a");
        assert_eq!(a.status, 201);
        assert_eq!(a.header("Location"), Some("https://pod.example/note.txt"));
        let b = call(&ldp, Method::Post, "/", &headers, b"b");
        assert_eq!(b.status, 201);
        let second = b.header("Location").unwrap();
        assert_ne!(second, "https://pod.example/note.txt");
        assert!(second.starts_with("https://pod.example/note-"));

        let c = call(&ldp, Method::Post, "/", &[("X-WebID", OWNER), ("Link", "<http://www.w3.org/ns/ldp#BasicContainer>; rel=\"type\""), ("Slug", "box")], b"");
        assert_eq!(c.status, 201);
        assert_eq!(c.header("Location"), Some("https://pod.example/box/"));
        assert!(d.path().join("box").is_dir());

        assert_eq!(call(&ldp, Method::Post, "/note.txt", &headers, b"a").status, 405);
        assert_eq!(call(&ldp, Method::Post, "/missing/", &headers, b"a").status, 404);
    }

    #[test]
    fn test_post_multipart() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        let body = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"f\"; filename=\"up.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            uploaded\r\n\
            --XyZ--\r\n";
        let headers = [("X-WebID", OWNER), ("Content-Type", "multipart/form-data; boundary=XyZ")];
        let mut r = call(&ldp, Method::Post, "/", &headers, body.as_bytes());
        assert_eq!(r.status, 201);
        assert_eq!(r.header("Location"), Some("https://pod.example/up.txt"));
        assert_eq!(r.body_bytes(), b"https://pod.example/up.txt\n".to_vec());
        assert_eq!(std::fs::read(d.path().join("up.txt")).unwrap(), b"uploaded".to_vec());
    }

    #[test]
    fn test_options_and_head() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());

        let r = call(&ldp, Method::Options, "/nowhere/", &[("Origin", "https://app.example")], b"");
        assert_eq!(r.status, 204);
        assert!(r.header("Allow").unwrap().contains("PATCH"));
        assert_eq!(r.header("Accept-Post"), Some("*/*"));
        assert_eq!(r.header("Access-Control-Allow-Origin"), Some("https://app.example"));

        assert_eq!(put_text(&ldp, "/a.txt", "hello").status, 201);
        let mut r = call(&ldp, Method::Head, "/a.txt", &[], b"");
        assert_eq!(r.status, 200);
        assert_eq!(r.header("Content-Length"), Some("5"));
        assert!(r.body_bytes().is_empty());
    }

    #[test]
    fn test_links_on_errors() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());

        let r = call(&ldp, Method::Get, "/missing.txt", &[], b"");
        assert_eq!(r.status, 404);
        let links = r.header_values("Link");
        assert!(links.iter().any(|l| l.contains("<https://pod.example/missing.txt.acl>; rel=\"acl\"")));
        assert!(links.iter().any(|l| l.contains("<https://pod.example/missing.txt.meta>; rel=\"describedBy\"")));

        let r = call(&ldp, Method::Put, "/locked.txt", &[("X-WebID", STRANGER), ("Content-Type", "text/plain")], b"x");
        assert_eq!(r.status, 403);
        assert!(r.header_values("Link").iter().any(|l| l.contains("rel=\"acl\"")));
    }

    #[test]
    fn test_options_never_not_found() {
        let d = tempdir().unwrap();
        let settings = Settings::with_root(d.path().to_path_buf(), Url::parse("https://pod.example/base/").unwrap());
        let ldp = Ldp::from_settings(settings).unwrap();

        let r = call(&ldp, Method::Options, "/elsewhere/doc", &[], b"");
        assert_eq!(r.status, 204);
        assert!(r.header("Allow").is_some());
        assert_eq!(call(&ldp, Method::Get, "/elsewhere/doc", &[], b"").status, 404);

        let r = call(&ldp, Method::Options, "*", &[], b"");
        assert_eq!(r.status, 204);

        let r = call(&ldp, Method::Options, "/base/.acl", &[], b"");
        assert_eq!(r.status, 204);
    }

    #[test]
    fn test_bad_requests() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());

        assert_eq!(call(&ldp, Method::Get, "/a/../../etc/passwd", &[], b"").status, 400);
        assert_eq!(call(&ldp, Method::Get, "/a/%2e%2e/b", &[], b"").status, 400);

        let acl = "<#a> <#b> <#c";
        let r = call(&ldp, Method::Put, "/x.acl", &[("X-WebID", OWNER), ("Content-Type", "text/turtle")], acl.as_bytes());
        assert_eq!(r.status, 400);
        assert_eq!(r.header("Content-Type"), Some("application/problem+json"));

        let r = call(&ldp, Method::NonStandard("BREW".parse().unwrap()), "/", &[], b"");
        assert_eq!(r.status, 405);
    }

    #[test]
    fn test_negotiation_and_ranges() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        assert_eq!(put_text(&ldp, "/a.txt", "hello").status, 201);

        assert_eq!(call(&ldp, Method::Get, "/a.txt", &[("Accept", "text/turtle")], b"").status, 406);

        let mut r = call(&ldp, Method::Get, "/a.txt", &[("Range", "bytes=1-3")], b"");
        assert_eq!(r.status, 206);
        assert_eq!(r.header("Content-Range"), Some("bytes 1-3/5"));
        assert_eq!(r.body_bytes(), b"ell".to_vec());

        let r = call(&ldp, Method::Get, "/a.txt", &[("Range", "bytes=10-")], b"");
        assert_eq!(r.status, 416);
        assert_eq!(r.header("Content-Range"), Some("bytes */5"));

        let r = call(&ldp, Method::Put, "/dir/", &[("X-WebID", OWNER)], b"");
        assert_eq!(r.status, 201);
        let r = call(&ldp, Method::Get, "/dir", &[], b"");
        assert_eq!(r.status, 301);
        assert_eq!(r.header("Location"), Some("https://pod.example/dir/"));
    }

    #[test]
    fn test_conditional_requests() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        assert_eq!(put_text(&ldp, "/a.txt", "hello").status, 201);

        let r = call(&ldp, Method::Get, "/a.txt", &[], b"");
        let etag = r.header("ETag").unwrap().to_string();
        let r = call(&ldp, Method::Get, "/a.txt", &[("If-None-Match", &etag)], b"");
        assert_eq!(r.status, 304);

        let r = call(&ldp, Method::Put, "/a.txt", &[("X-WebID", OWNER), ("If-Match", "\"nope\"")], b"x");
        assert_eq!(r.status, 412);
        let r = call(&ldp, Method::Put, "/b.txt", &[("X-WebID", OWNER), ("If-None-Match", "*")], b"x");
        assert_eq!(r.status, 201);
        let r = call(&ldp, Method::Put, "/b.txt", &[("X-WebID", OWNER), ("If-None-Match", "*")], b"y");
        assert_eq!(r.status, 412);
    }

    #[test]
    fn test_copy_local() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        assert_eq!(put_text(&ldp, "/a.txt", "hello").status, 201);

        let r = call(&ldp, Method::NonStandard("COPY".parse().unwrap()), "/b.txt", &[("X-WebID", OWNER), ("Source", "/a.txt")], b"");
        assert_eq!(r.status, 201);
        assert_eq!(std::fs::read(d.path().join("b.txt")).unwrap(), b"hello".to_vec());

        let r = call(&ldp, Method::NonStandard("COPY".parse().unwrap()), "/c.txt", &[("X-WebID", OWNER), ("Source", "/gone.txt")], b"");
        assert_eq!(r.status, 404);
        let r = call(&ldp, Method::NonStandard("COPY".parse().unwrap()), "/c.txt", &[("X-WebID", OWNER)], b"");
        assert_eq!(r.status, 400);
    }

    #[test]
    fn test_container_listing() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        let owner = [("X-WebID", OWNER)];

        let r = call(&ldp, Method::Put, "/c/doc.ttl", &[("X-WebID", OWNER), ("Content-Type", "text/turtle")], b"<a> <b> <c> .");
        assert_eq!(r.status, 201);
        for slug in ["one", "two"].iter() {
            let r = call(&ldp, Method::Post, "/c/", &[("X-WebID", OWNER), ("Content-Type", "text/plain"), ("Slug", *slug)], b"x");
            assert_eq!(r.status, 201);
        }

        let mut r = call(&ldp, Method::Get, "/c/", &[("Accept", "text/turtle")], b"");
        assert_eq!(r.status, 200);
        assert!(r.header_values("Link").iter().any(|l| l.contains("BasicContainer")));
        let text = String::from_utf8(r.body_bytes()).unwrap();
        let g = rdf::parse(&text, rdf::TEXT_TURTLE, "https://pod.example/c/").unwrap();
        let contained = g.objects(&Term::iri("https://pod.example/c/"), "http://www.w3.org/ns/ldp#contains");
        assert_eq!(contained.len(), 3);
        assert!(contained.contains(&Term::iri("https://pod.example/c/doc.ttl")));
        assert!(contained.contains(&Term::iri("https://pod.example/c/one.txt")));

        assert_eq!(call(&ldp, Method::Delete, "/c/doc.ttl", &owner, b"").status, 200);
        assert_eq!(call(&ldp, Method::Get, "/c/doc.ttl", &[], b"").status, 404);
    }

    #[test]
    fn test_acl_inheritance() {
        let d = tempdir().unwrap();
        let ldp = server(d.path());
        let turtle = [("X-WebID", OWNER), ("Content-Type", "text/turtle")];
        let private = format!(
            "@prefix acl: <http://www.w3.org/ns/auth/acl#>.\n\
            <#owner> a acl:Authorization; acl:agent <{}>; acl:accessTo <./>; acl:default <./>;\n\
            acl:mode acl:Read, acl:Write, acl:Control .",
            OWNER,
        );

        assert_eq!(call(&ldp, Method::Put, "/private/", &[("X-WebID", OWNER)], b"").status, 201);
        assert_eq!(call(&ldp, Method::Put, "/private/.acl", &turtle, private.as_bytes()).status, 201);
        assert_eq!(put_text(&ldp, "/private/doc.txt", "secret").status, 201);

        assert_eq!(call(&ldp, Method::Get, "/private/doc.txt", &[], b"").status, 401);
        assert_eq!(call(&ldp, Method::Get, "/private/doc.txt", &[("X-WebID", STRANGER)], b"").status, 403);
        let r = call(&ldp, Method::Get, "/private/doc.txt", &[("X-WebID", OWNER)], b"");
        assert_eq!(r.status, 200);
        assert!(r.header("WAC-Allow").unwrap().contains("public=\"\""));

        let public = format!(
            "{}\n@prefix foaf: <http://xmlns.com/foaf/0.1/>.\n\
            <#public> a acl:Authorization; acl:agentClass foaf:Agent; acl:default <./>; acl:mode acl:Read .",
            private,
        );
        assert_eq!(call(&ldp, Method::Put, "/private/.acl", &turtle, public.as_bytes()).status, 204);
        assert_eq!(call(&ldp, Method::Get, "/private/doc.txt", &[], b"").status, 200);
        assert_eq!(call(&ldp, Method::Put, "/private/doc.txt", &[("Content-Type", "text/plain")], b"x").status, 401);
    }
}
