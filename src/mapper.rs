//! Mapping between resource URLs and files below the storage root.
//!
//! The file path mirrors the URL path. A resource whose URL extension does
//! not imply its content type is stored with a synthetic suffix after `$`:
//! `PUT /notes` with `text/turtle` is written to `notes$.ttl`, and the
//! file maps back to `/notes`. Looking up an existing resource therefore
//! scans its directory for `name` or `name$…`.

use std::fs;
use std::io;
use std::path::{
    Component,
    Path,
    PathBuf,
};

use log::debug;
use percent_encoding::{
    percent_decode_str,
    utf8_percent_encode,
    AsciiSet,
    CONTROLS,
};
use url::Url;

use crate::error::RequestError;
use crate::rdf::essence;
use crate::target::check_segments;

/// Separator between a resource name and its content-type suffix.
pub const DOLLAR: char = '$';

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Extensions the server has its own opinion about; first entry per type is preferred.
const TYPES: [(&str, &str); 14] = [
    ("ttl", "text/turtle"),
    ("acl", "text/turtle"),
    ("meta", "text/turtle"),
    ("n3", "text/n3"),
    ("nt", "application/n-triples"),
    ("jsonld", "application/ld+json"),
    ("rdf", "application/rdf+xml"),
    ("owl", "application/rdf+xml"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("txt", "text/plain"),
    ("json", "application/json"),
    ("md", "text/markdown"),
    ("bin", "application/octet-stream"),
];

/// Content type implied by the extension of a file or resource name.
pub fn content_type_for_name(name: &str) -> String {
    let ext = match name.rfind('.') {
        Some(p) if p + 1 < name.len() => name[p + 1..].to_ascii_lowercase(),
        _ => return DEFAULT_CONTENT_TYPE.to_string(),
    };
    for (e, t) in TYPES.iter() {
        if *e == ext {
            return t.to_string();
        }
    }
    match mime_guess::from_ext(&ext).first() {
        Some(m) => m.essence_str().to_string(),
        None => DEFAULT_CONTENT_TYPE.to_string(),
    }
}

/// Preferred file extension for a content type, without the dot.
pub fn extension_for(content_type: &str) -> Option<String> {
    let e = essence(content_type);
    for (ext, t) in TYPES.iter() {
        if *t == e {
            return Some(ext.to_string());
        }
    }
    match mime_guess::get_mime_extensions_str(&e) {
        Some(exts) => exts.first().map(|v| v.to_string()),
        None => None,
    }
}

/// A file location together with the content type its name implies.
#[derive(Clone, Debug, PartialEq)]
pub struct Mapping {
    pub path: PathBuf,
    pub content_type: String,
}

#[derive(Clone, Debug)]
pub struct ResourceMapper {
    root_path: PathBuf,
    root_url: Url,
    include_host: bool,
}

fn decode(segment: &str) -> Result<String, RequestError> {
    match percent_decode_str(segment).decode_utf8() {
        Ok(v) => Ok(v.to_string()),
        Err(_) => Err(RequestError::bad_request("path is not valid utf-8")),
    }
}

impl ResourceMapper {
    pub fn new(root_path: PathBuf, root_url: Url, include_host: bool) -> ResourceMapper {
        ResourceMapper {
            root_path,
            root_url,
            include_host,
        }
    }

    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    fn base_path(&self, hostname: &str) -> PathBuf {
        if self.include_host {
            return self.root_path.join(hostname);
        }
        self.root_path.clone()
    }

    /// The file path mirroring `url`, before any `$` lookup.
    pub fn url_path(&self, url: &Url) -> Result<PathBuf, RequestError> {
        let path = url.path();
        check_segments(path)?;
        let prefix = self.root_url.path();
        let rest = match path.strip_prefix(prefix) {
            Some(v) => v,
            None => {
                return Err(RequestError::not_found(&format!("{} is outside of this server", url)));
            },
        };
        let hostname = match url.host_str() {
            Some(v) => v,
            None => "",
        };
        let mut p = self.base_path(hostname);
        for segment in rest.split('/') {
            if segment.is_empty() {
                continue;
            }
            p.push(decode(segment)?);
        }
        if p.components().any(|c| c == Component::ParentDir) {
            return Err(RequestError::bad_request("disallowed path segment"));
        }
        Ok(p)
    }

    /// Locate the existing file for `url`. None when nothing is stored there.
    pub fn to_path(&self, url: &Url) -> Result<Option<Mapping>, RequestError> {
        let path = self.url_path(url)?;
        if url.path().ends_with('/') {
            return Ok(Some(Mapping {
                path,
                content_type: crate::rdf::TEXT_TURTLE.to_string(),
            }));
        }
        let (dir, name) = match (path.parent(), path.file_name()) {
            (Some(d), Some(n)) => (d.to_path_buf(), n.to_string_lossy().to_string()),
            _ => return Ok(None),
        };
        if !dir.is_dir() {
            return Ok(None);
        }
        let entries = match fs::read_dir(&dir) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(None);
            },
            Err(e) => {
                return Err(RequestError::from(e));
            },
        };
        let dollar_prefix = format!("{}{}", name, DOLLAR);
        let mut found: Option<String> = None;
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name == name {
                found = Some(file_name);
                break;
            }
            if found.is_none() && file_name.starts_with(&dollar_prefix) {
                found = Some(file_name);
            }
        }
        match found {
            Some(f) => {
                debug!("url {} found as {:?}", url, dir.join(&f));
                Ok(Some(Mapping {
                    content_type: content_type_for_name(&f),
                    path: dir.join(f),
                }))
            },
            None => Ok(None),
        }
    }

    /// File path for a new resource at `url` that must carry `content_type`.
    pub fn create_path(&self, url: &Url, content_type: &str) -> Result<Mapping, RequestError> {
        let path = self.url_path(url)?;
        if url.path().ends_with('/') {
            return Ok(Mapping {
                path,
                content_type: crate::rdf::TEXT_TURTLE.to_string(),
            });
        }
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => return Err(RequestError::bad_request("missing resource name")),
        };
        let wanted = essence(content_type);
        if wanted.is_empty() || content_type_for_name(&name) == wanted {
            return Ok(Mapping {
                path,
                content_type: content_type_for_name(&name),
            });
        }
        let suffix = match extension_for(&wanted) {
            Some(e) => format!("{}.{}", DOLLAR, e),
            None => DOLLAR.to_string(),
        };
        Ok(Mapping {
            path: path.with_file_name(format!("{}{}", name, suffix)),
            content_type: wanted,
        })
    }

    /// URL of a stored file (or directory, when `is_dir`) and the content type its name implies.
    pub fn to_url(&self, path: &Path, hostname: &str, is_dir: bool) -> Result<(Url, String), RequestError> {
        let base = self.base_path(hostname);
        let rel = match path.strip_prefix(&base) {
            Ok(v) => v,
            Err(_) => {
                return Err(RequestError::internal(&format!("{:?} is outside of the storage root", path)));
            },
        };
        let mut segments: Vec<String> = vec!();
        for c in rel.components() {
            match c {
                Component::Normal(s) => {
                    segments.push(s.to_string_lossy().to_string());
                },
                _ => {
                    return Err(RequestError::internal(&format!("unexpected component in {:?}", path)));
                },
            }
        }
        let content_type = match segments.last() {
            Some(last) if !is_dir => content_type_for_name(last),
            _ => crate::rdf::TEXT_TURTLE.to_string(),
        };
        if let Some(last) = segments.last_mut() {
            if let Some(p) = last.find(DOLLAR) {
                last.truncate(p);
            }
        }
        let mut encoded: Vec<String> = segments.iter().map(|s| utf8_percent_encode(s, SEGMENT).to_string()).collect();
        if is_dir {
            encoded.push(String::new());
        }
        let mut root = self.root_url.clone();
        if self.include_host {
            if root.set_host(Some(hostname)).is_err() {
                return Err(RequestError::internal(&format!("invalid hostname {}", hostname)));
            }
        }
        match root.join(&encoded.join("/")) {
            Ok(u) => Ok((u, content_type)),
            Err(e) => Err(RequestError::internal(&e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use url::Url;

    use super::{
        content_type_for_name,
        extension_for,
        ResourceMapper,
    };

    fn mapper(root: PathBuf) -> ResourceMapper {
        ResourceMapper::new(root, Url::parse("https://pod.example/").unwrap(), false)
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for_name("a.ttl"), "text/turtle");
        assert_eq!(content_type_for_name(".acl"), "text/turtle");
        assert_eq!(content_type_for_name("x$.jsonld"), "application/ld+json");
        assert_eq!(content_type_for_name("noext"), "application/octet-stream");
        assert_eq!(content_type_for_name("p.png"), "image/png");
        assert_eq!(extension_for("text/turtle; charset=utf-8").as_deref(), Some("ttl"));
    }

    #[test]
    fn test_create_path_dollar() {
        let d = tempdir().unwrap();
        let m = mapper(d.path().to_path_buf());

        let u = Url::parse("https://pod.example/c/notes").unwrap();
        let r = m.create_path(&u, "text/turtle").unwrap();
        assert_eq!(r.path, d.path().join("c").join("notes$.ttl"));

        let u = Url::parse("https://pod.example/c/doc.ttl").unwrap();
        let r = m.create_path(&u, "text/turtle").unwrap();
        assert_eq!(r.path, d.path().join("c").join("doc.ttl"));

        let u = Url::parse("https://pod.example/c/doc.ttl").unwrap();
        let r = m.create_path(&u, "text/html").unwrap();
        assert_eq!(r.path, d.path().join("c").join("doc.ttl$.html"));
        assert_eq!(r.content_type, "text/html");
    }

    #[test]
    fn test_lookup_scans_for_dollar() {
        let d = tempdir().unwrap();
        fs::create_dir(d.path().join("c")).unwrap();
        fs::write(d.path().join("c").join("notes$.ttl"), b"<a> <b> <c> .").unwrap();
        let m = mapper(d.path().to_path_buf());

        let u = Url::parse("https://pod.example/c/notes").unwrap();
        let r = m.to_path(&u).unwrap().unwrap();
        assert_eq!(r.content_type, "text/turtle");

        let u = Url::parse("https://pod.example/c/missing").unwrap();
        assert!(m.to_path(&u).unwrap().is_none());

        let u = Url::parse("https://pod.example/nodir/x").unwrap();
        assert!(m.to_path(&u).unwrap().is_none());
    }

    #[test]
    fn test_to_url_strips_dollar() {
        let d = tempdir().unwrap();
        let m = mapper(d.path().to_path_buf());
        let p = d.path().join("c").join("my notes$.ttl");
        let (u, t) = m.to_url(&p, "pod.example", false).unwrap();
        assert_eq!(u.as_str(), "https://pod.example/c/my%20notes");
        assert_eq!(t, "text/turtle");

        let (u, _) = m.to_url(&d.path().join("c"), "pod.example", true).unwrap();
        assert_eq!(u.as_str(), "https://pod.example/c/");
    }

    #[test]
    fn test_multiuser_paths() {
        let d = tempdir().unwrap();
        let m = ResourceMapper::new(d.path().to_path_buf(), Url::parse("https://pod.example/").unwrap(), true);
        let u = Url::parse("https://alice.pod.example/profile/card").unwrap();
        let p = m.url_path(&u).unwrap();
        assert_eq!(p, d.path().join("alice.pod.example").join("profile").join("card"));
    }

    #[test]
    fn test_traversal_rejected() {
        let d = tempdir().unwrap();
        let m = mapper(d.path().to_path_buf());
        let u = Url::parse("https://pod.example/a%2F..%2Fb").unwrap();
        assert_eq!(m.url_path(&u).unwrap_err().status(), 400);
    }
}
