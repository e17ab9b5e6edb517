//! Storage of resources and containers.
//!
//! A [Store](Store) hands out fresh [Resource](Resource) snapshots per
//! request; storage is the source of truth and nothing is cached. Writes
//! go through a [WriteStream](WriteStream) that only becomes visible on
//! `commit`; dropping it uncommitted discards everything written.

use std::io::{
    Read,
    Write,
};
use std::path::PathBuf;
use std::time::{
    SystemTime,
    UNIX_EPOCH,
};

use log::debug;
use percent_encoding::{
    utf8_percent_encode,
    AsciiSet,
    CONTROLS,
};
use sha2::{
    Digest,
    Sha256,
};
use url::Url;
use uuid::Uuid;

use crate::error::{
    RequestError,
    RequestErrorType,
};
use crate::mapper::extension_for;
use crate::rdf::{
    self,
    Graph,
};
use crate::target::{
    Target,
    SUFFIX_ACL,
    SUFFIX_META,
};

/// Filesystem-backed store.
pub mod file;

/// In-memory store for tests and embedding.
pub mod memory;

const SLUG: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const BUFFER_SIZE: usize = 65535;

/// Snapshot of a storage entry, bound to the target it was looked up for.
#[derive(Clone, Debug)]
pub struct Resource {
    pub target: Target,
    pub exists: bool,
    pub is_container: bool,
    pub content_type: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Backing file, for file stores.
    pub path: Option<PathBuf>,
    /// Existing backing file a write to this resource supersedes.
    pub replaces: Option<PathBuf>,
}

impl Resource {
    /// A resource that is not stored.
    pub fn absent(target: &Target) -> Resource {
        Resource {
            target: target.clone(),
            exists: false,
            is_container: target.is_container(),
            content_type: String::new(),
            size: 0,
            modified: None,
            path: None,
            replaces: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.target.url
    }

    /// Entity tag over size and modification time.
    pub fn etag(&self) -> Option<String> {
        if !self.exists {
            return None;
        }
        let nanos = match self.modified.map(|m| m.duration_since(UNIX_EPOCH)) {
            Some(Ok(d)) => d.as_nanos(),
            _ => 0,
        };
        let mut h = Sha256::new();
        h.update(self.size.to_be_bytes());
        h.update(nanos.to_be_bytes());
        h.update(self.content_type.as_bytes());
        let digest = h.finalize();
        Some(format!("\"{}\"", hex::encode(&digest[..16])))
    }

    pub fn last_modified(&self) -> Option<String> {
        self.modified.map(httpdate::fmt_http_date)
    }
}

/// A container with its children, populated on demand.
#[derive(Clone, Debug)]
pub struct Container {
    pub resource: Resource,
    /// Child names relative to the container, containers ending in `/`.
    pub resource_names: Vec<String>,
    pub resources: Vec<Resource>,
}

impl Container {
    pub fn new(resource: Resource) -> Container {
        Container {
            resource,
            resource_names: vec!(),
            resources: vec!(),
        }
    }

    /// Whether the container holds anything besides its own `.acl` and `.meta`.
    pub fn has_content(&self) -> bool {
        self.resource_names.iter().any(|n| n != SUFFIX_ACL && n != SUFFIX_META)
    }
}

/// Buffered destination of a write. Data is published by `commit` only.
pub trait WriteStream: Write + Send {
    fn commit(self: Box<Self>) -> Result<(), RequestError>;
}

fn sanitize_slug(slug: &str) -> Result<String, RequestError> {
    let s = slug.trim();
    if s.contains('/') || s.contains('|') || s.contains(':') {
        return Err(RequestError::bad_request("slug may not contain /, | or :"));
    }
    if s.contains('$') || s.contains('\\') || s == "." || s == ".." {
        return Err(RequestError::bad_request(&format!("invalid slug {}", s)));
    }
    Ok(s.to_string())
}

fn random_token() -> String {
    let mut s = Uuid::new_v4().simple().to_string();
    s.truncate(12);
    s
}

pub trait Store: Send + Sync {
    /// Look up what is stored for `target`.
    fn resource(&self, target: &Target) -> Result<Resource, RequestError>;

    /// Plan a write of `content_type` to `target`.
    fn add_resource(&self, target: &Target, content_type: &str) -> Result<Resource, RequestError>;

    /// Create `container` and its ancestors. Returns true if it did not exist.
    fn ensure_container(&self, container: &Target) -> Result<bool, RequestError>;

    /// Open stored content, optionally restricted to the inclusive byte range.
    fn create_read_stream(&self, resource: &Resource, range: Option<(u64, u64)>) -> Result<Box<dyn Read + Send>, RequestError>;

    fn create_write_stream(&self, resource: &Resource) -> Result<Box<dyn WriteStream>, RequestError>;

    /// Fill `container.resource_names`.
    fn load_contents_list(&self, container: &mut Container) -> Result<(), RequestError>;

    fn delete_resource(&self, resource: &Resource) -> Result<(), RequestError>;

    /// Remove a container and everything below it. Emptiness is the caller's business.
    fn delete_container(&self, container: &Resource) -> Result<(), RequestError>;

    fn exists(&self, target: &Target) -> Result<bool, RequestError> {
        Ok(self.resource(target)?.exists)
    }

    /// Whether `target` would clash with a stored resource of the other kind,
    /// `…/x` against `…/x/` or anything below a plain file.
    fn clashes(&self, target: &Target) -> Result<bool, RequestError> {
        let other = if target.is_container() {
            let loc = target.location();
            match Url::parse(loc.trim_end_matches('/')) {
                Ok(u) => Target::from_url(u),
                Err(_) => return Ok(false),
            }
        } else {
            target.as_container()
        };
        if !other.is_root() && self.exists(&other)? {
            return Ok(true);
        }
        let mut parent = target.parent();
        while let Some(p) = parent {
            if p.is_root() {
                break;
            }
            let loc = p.location();
            if let Ok(u) = Url::parse(loc.trim_end_matches('/')) {
                if self.exists(&Target::from_url(u))? {
                    return Ok(true);
                }
            }
            parent = p.parent();
        }
        Ok(false)
    }

    /// Name a new child of `container` for POST, from the client's slug if any.
    fn target_from_slug(&self, slug: Option<&str>, container: &Target, content_type: &str, is_container: bool) -> Result<Target, RequestError> {
        let base = match slug {
            Some(s) if !s.trim().is_empty() => sanitize_slug(s)?,
            _ => Uuid::new_v4().to_string(),
        };
        let extension = if is_container {
            String::new()
        } else {
            match extension_for(content_type) {
                Some(e) => {
                    let ext = format!(".{}", e);
                    if base.ends_with(&ext) || base.ends_with(SUFFIX_ACL) || base.ends_with(SUFFIX_META) {
                        String::new()
                    } else {
                        ext
                    }
                },
                None => String::new(),
            }
        };
        let mut name = format!("{}{}", base, extension);
        loop {
            let mut encoded = utf8_percent_encode(&name, SLUG).to_string();
            if is_container {
                encoded.push('/');
            }
            let candidate = container.child(&encoded)?;
            if !self.exists(&candidate)? && !self.clashes(&candidate)? {
                debug!("slug {:?} resolved to {}", slug, candidate.url);
                return Ok(candidate);
            }
            name = format!("{}-{}{}", base, random_token(), extension);
        }
    }

    /// Stream `body` into `resource`, checking the declared length.
    fn write_resource_stream(&self, resource: &Resource, body: &mut dyn Read, expected_size: Option<usize>) -> Result<u64, RequestError> {
        let mut w = self.create_write_stream(resource)?;
        let mut buf = vec![0u8; BUFFER_SIZE];
        let mut total_size: u64 = 0;
        loop {
            let n = match body.read(&mut buf[..]) {
                Ok(0) => break,
                Ok(v) => v,
                Err(e) => {
                    return Err(RequestError::new(RequestErrorType::ReadError, &format!("cannot read request body: {}", e)));
                },
            };
            total_size += n as u64;
            w.write_all(&buf[..n])?;
        }
        if let Some(expected) = expected_size {
            if expected as u64 != total_size {
                return Err(RequestError::new(
                    RequestErrorType::ReadError,
                    &format!("body length {} does not match declared {}", total_size, expected),
                ));
            }
        }
        w.commit()?;
        Ok(total_size)
    }

    fn copy_resource(&self, from: &Resource, to: &Resource) -> Result<u64, RequestError> {
        let mut r = self.create_read_stream(from, None)?;
        self.write_resource_stream(to, &mut r, None)
    }

    /// Fill both `resource_names` and the child `resources`.
    fn load_contents_details(&self, container: &mut Container) -> Result<(), RequestError> {
        self.load_contents_list(container)?;
        let mut resources = vec!();
        for name in container.resource_names.iter() {
            let encoded = utf8_percent_encode(name.trim_end_matches('/'), SLUG).to_string();
            let child = if name.ends_with('/') {
                container.resource.target.child(&format!("{}/", encoded))?
            } else {
                container.resource.target.child(&encoded)?
            };
            let r = self.resource(&child)?;
            if r.exists {
                resources.push(r);
            }
        }
        container.resources = resources;
        Ok(())
    }

    fn read_blob(&self, resource: &Resource) -> Result<Vec<u8>, RequestError> {
        let mut r = self.create_read_stream(resource, None)?;
        let mut v = vec!();
        r.read_to_end(&mut v)?;
        Ok(v)
    }

    fn write_blob(&self, resource: &Resource, data: &[u8]) -> Result<(), RequestError> {
        let mut w = self.create_write_stream(resource)?;
        w.write_all(data)?;
        w.commit()
    }

    /// The resource's graph; empty when it does not exist.
    fn load_parsed_graph(&self, resource: &Resource) -> Result<Graph, RequestError> {
        if !resource.exists {
            return Ok(Graph::new());
        }
        let data = self.read_blob(resource)?;
        let text = match String::from_utf8(data) {
            Ok(v) => v,
            Err(_) => {
                return Err(RequestError::internal(&format!("{} is not valid utf-8", resource.target.url)));
            },
        };
        rdf::parse(&text, &resource.content_type, &resource.target.location())
    }

    fn write_graph(&self, resource: &Resource, graph: &Graph) -> Result<(), RequestError> {
        let text = rdf::serialize(graph, &resource.content_type)?;
        self.write_blob(resource, text.as_bytes())
    }
}
