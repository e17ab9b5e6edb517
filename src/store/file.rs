use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::io;
use std::io::{
    Read,
    Seek,
    SeekFrom,
    Write,
};
use std::path::PathBuf;

use log::{
    debug,
    info,
};
use tempfile::{
    Builder,
    NamedTempFile,
};

use crate::error::RequestError;
use crate::mapper::{
    ResourceMapper,
    DOLLAR,
};
use crate::target::Target;
use super::{
    Container,
    Resource,
    Store,
    WriteStream,
};

/// Prefix of in-flight upload files, never listed.
const TEMP_PREFIX: &str = ".podd-";

/// Resources stored as files below a root directory.
pub struct FileStore {
    mapper: ResourceMapper,
}

struct FileWriteStream {
    file: NamedTempFile,
    path: PathBuf,
    replaces: Option<PathBuf>,
}

impl Write for FileWriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl WriteStream for FileWriteStream {
    fn commit(self: Box<Self>) -> Result<(), RequestError> {
        let s = *self;
        s.file.as_file().sync_all()?;
        match s.file.persist(&s.path) {
            Ok(_) => {},
            Err(e) => {
                return Err(RequestError::from(e.error));
            },
        };
        debug!("committed {:?}", &s.path);
        if let Some(old) = s.replaces {
            if old != s.path {
                match fs::remove_file(&old) {
                    Ok(_) => {
                        debug!("removed superseded {:?}", old);
                    },
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {},
                    Err(e) => {
                        return Err(RequestError::from(e));
                    },
                }
            }
        }
        Ok(())
    }
}

fn required_path(resource: &Resource) -> Result<PathBuf, RequestError> {
    match &resource.path {
        Some(v) => Ok(v.clone()),
        None => Err(RequestError::internal(&format!("no file mapped for {}", resource.target.url))),
    }
}

impl FileStore {
    pub fn new(mapper: ResourceMapper) -> FileStore {
        FileStore {
            mapper,
        }
    }

    pub fn mapper(&self) -> &ResourceMapper {
        &self.mapper
    }

    /// Children of a container from a single directory read, keyed by listed name.
    /// An exact file name wins over a `$` file for the same resource.
    fn scan(&self, container: &Container) -> Result<BTreeMap<String, Resource>, RequestError> {
        let target = &container.resource.target;
        let path = match &container.resource.path {
            Some(v) => v.clone(),
            None => self.mapper.url_path(&target.url)?,
        };
        let entries = match fs::read_dir(&path) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RequestError::not_found(&format!("{} not found", target.url)));
            },
            Err(e) => {
                return Err(RequestError::from(e));
            },
        };
        let hostname = target.url.host_str().unwrap_or("").to_string();
        let mut found = BTreeMap::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.starts_with(TEMP_PREFIX) {
                continue;
            }
            let meta = entry.metadata()?;
            let is_dir = meta.is_dir();
            let mut name = file_name.clone();
            let exact = match name.find(DOLLAR) {
                Some(p) if !is_dir => {
                    name.truncate(p);
                    false
                },
                _ => true,
            };
            if is_dir {
                name.push('/');
            }
            if !exact && found.contains_key(&name) {
                continue;
            }
            let (url, content_type) = self.mapper.to_url(&entry.path(), &hostname, is_dir)?;
            found.insert(name, Resource {
                target: Target::from_url(url),
                exists: true,
                is_container: is_dir,
                content_type,
                size: if is_dir { 0 } else { meta.len() },
                modified: meta.modified().ok(),
                path: Some(entry.path()),
                replaces: None,
            });
        }
        Ok(found)
    }
}

impl Store for FileStore {
    fn resource(&self, target: &Target) -> Result<Resource, RequestError> {
        let mapping = match self.mapper.to_path(&target.url)? {
            Some(v) => v,
            None => return Ok(Resource::absent(target)),
        };
        let meta = match fs::metadata(&mapping.path) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Resource::absent(target));
            },
            Err(e) => {
                // a plain file somewhere up the path
                match mapping.path.parent() {
                    Some(p) if !p.is_dir() => {
                        return Ok(Resource::absent(target));
                    },
                    _ => {
                        return Err(RequestError::from(e));
                    },
                };
            },
        };
        if meta.is_dir() != target.is_container() {
            return Ok(Resource::absent(target));
        }
        Ok(Resource {
            target: target.clone(),
            exists: true,
            is_container: meta.is_dir(),
            content_type: mapping.content_type,
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified: meta.modified().ok(),
            path: Some(mapping.path),
            replaces: None,
        })
    }

    fn add_resource(&self, target: &Target, content_type: &str) -> Result<Resource, RequestError> {
        let current = self.resource(target)?;
        let mapping = self.mapper.create_path(&target.url, content_type)?;
        let replaces = if current.exists {
            current.path.clone()
        } else {
            None
        };
        Ok(Resource {
            target: target.clone(),
            exists: current.exists,
            is_container: target.is_container(),
            content_type: mapping.content_type,
            size: current.size,
            modified: current.modified,
            path: Some(mapping.path),
            replaces,
        })
    }

    fn ensure_container(&self, container: &Target) -> Result<bool, RequestError> {
        let path = self.mapper.url_path(&container.url)?;
        if path.is_dir() {
            return Ok(false);
        }
        if path.exists() || path.ancestors().skip(1).any(|a| a.is_file()) {
            return Err(RequestError::conflict(&format!("{} exists and is not a container", container.url)));
        }
        match fs::create_dir_all(&path) {
            Ok(_) => {
                info!("created container {}", container.url);
                Ok(true)
            },
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(RequestError::conflict(&format!("cannot create container {}", container.url)))
            },
            Err(e) => Err(RequestError::from(e)),
        }
    }

    fn create_read_stream(&self, resource: &Resource, range: Option<(u64, u64)>) -> Result<Box<dyn Read + Send>, RequestError> {
        let path = required_path(resource)?;
        let mut f = match File::open(&path) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RequestError::not_found(&format!("{} not found", resource.target.url)));
            },
            Err(e) => {
                return Err(RequestError::from(e));
            },
        };
        match range {
            Some((start, end)) => {
                f.seek(SeekFrom::Start(start))?;
                Ok(Box::new(f.take(end - start + 1)))
            },
            None => Ok(Box::new(f)),
        }
    }

    fn create_write_stream(&self, resource: &Resource) -> Result<Box<dyn WriteStream>, RequestError> {
        let path = required_path(resource)?;
        let dir = match path.parent() {
            Some(v) => v.to_path_buf(),
            None => return Err(RequestError::internal(&format!("{:?} has no parent", path))),
        };
        fs::create_dir_all(&dir)?;
        let file = Builder::new().prefix(TEMP_PREFIX).tempfile_in(&dir)?;
        debug!("writing {} through {:?}", resource.target.url, file.path());
        Ok(Box::new(FileWriteStream {
            file,
            path,
            replaces: resource.replaces.clone(),
        }))
    }

    fn load_contents_list(&self, container: &mut Container) -> Result<(), RequestError> {
        container.resource_names = self.scan(container)?.into_keys().collect();
        Ok(())
    }

    fn load_contents_details(&self, container: &mut Container) -> Result<(), RequestError> {
        let found = self.scan(container)?;
        container.resource_names = found.keys().cloned().collect();
        container.resources = found.into_values().collect();
        Ok(())
    }

    fn delete_resource(&self, resource: &Resource) -> Result<(), RequestError> {
        let path = required_path(resource)?;
        match fs::remove_file(&path) {
            Ok(_) => {
                info!("deleted {}", resource.target.url);
                Ok(())
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(RequestError::not_found(&format!("{} not found", resource.target.url)))
            },
            Err(e) => Err(RequestError::from(e)),
        }
    }

    fn delete_container(&self, container: &Resource) -> Result<(), RequestError> {
        let path = required_path(container)?;
        fs::remove_dir_all(&path)?;
        info!("deleted container {}", container.target.url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{
        Read,
        Write,
    };
    use std::path::Path;
    use tempfile::tempdir;
    use url::Url;

    use crate::mapper::ResourceMapper;
    use crate::rdf::Graph;
    use crate::store::{
        Container,
        Store,
    };
    use crate::target::Target;
    use super::FileStore;

    fn store(root: &Path) -> FileStore {
        let mapper = ResourceMapper::new(root.to_path_buf(), Url::parse("https://pod.example/").unwrap(), false);
        FileStore::new(mapper)
    }

    fn target(u: &str) -> Target {
        Target::from_url(Url::parse(u).unwrap())
    }

    #[test]
    fn test_missing_is_not_an_error() {
        let d = tempdir().unwrap();
        let s = store(d.path());
        let r = s.resource(&target("https://pod.example/nothing/here.ttl")).unwrap();
        assert!(!r.exists);
    }

    #[test]
    fn test_write_then_read() {
        let d = tempdir().unwrap();
        let s = store(d.path());
        let t = target("https://pod.example/c/notes");
        let planned = s.add_resource(&t, "text/turtle").unwrap();
        assert!(!planned.exists);
        let mut body: &[u8] = b"<a> <b> <c> .";
        let n = s.write_resource_stream(&planned, &mut body, Some(13)).unwrap();
        assert_eq!(n, 13);
        assert!(d.path().join("c").join("notes$.ttl").is_file());

        let r = s.resource(&t).unwrap();
        assert!(r.exists);
        assert_eq!(r.content_type, "text/turtle");
        assert_eq!(r.size, 13);
        let g: Graph = s.load_parsed_graph(&r).unwrap();
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_length_mismatch_leaves_nothing() {
        let d = tempdir().unwrap();
        let s = store(d.path());
        let t = target("https://pod.example/short.txt");
        let planned = s.add_resource(&t, "text/plain").unwrap();
        let mut body: &[u8] = b"abc";
        let e = s.write_resource_stream(&planned, &mut body, Some(10)).unwrap_err();
        assert_eq!(e.status(), 400);
        assert!(!s.resource(&t).unwrap().exists);
        let leftovers: Vec<_> = fs::read_dir(d.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_uncommitted_stream_is_discarded() {
        let d = tempdir().unwrap();
        let s = store(d.path());
        let t = target("https://pod.example/a.txt");
        let planned = s.add_resource(&t, "text/plain").unwrap();
        {
            let mut w = s.create_write_stream(&planned).unwrap();
            w.write_all(b"partial").unwrap();
        }
        assert!(!s.resource(&t).unwrap().exists);
    }

    #[test]
    fn test_content_type_change_replaces_file() {
        let d = tempdir().unwrap();
        let s = store(d.path());
        let t = target("https://pod.example/doc");
        let planned = s.add_resource(&t, "text/turtle").unwrap();
        s.write_blob(&planned, b"<a> <b> <c> .").unwrap();
        let planned = s.add_resource(&t, "text/html").unwrap();
        assert!(planned.exists);
        s.write_blob(&planned, b"<p>hi</p>").unwrap();
        assert!(!d.path().join("doc$.ttl").exists());
        assert!(d.path().join("doc$.html").exists());
        assert_eq!(s.resource(&t).unwrap().content_type, "text/html");
    }

    #[test]
    fn test_ensure_container_is_idempotent() {
        let d = tempdir().unwrap();
        let s = store(d.path());
        let c = target("https://pod.example/a/b/");
        assert!(s.ensure_container(&c).unwrap());
        fs::write(d.path().join("a").join("b").join("keep.txt"), b"x").unwrap();
        assert!(!s.ensure_container(&c).unwrap());
        assert!(d.path().join("a").join("b").join("keep.txt").exists());
    }

    #[test]
    fn test_listing_strips_dollar() {
        let d = tempdir().unwrap();
        fs::create_dir_all(d.path().join("c").join("sub")).unwrap();
        fs::write(d.path().join("c").join("notes$.ttl"), b"").unwrap();
        fs::write(d.path().join("c").join(".acl"), b"").unwrap();
        let s = store(d.path());
        let r = s.resource(&target("https://pod.example/c/")).unwrap();
        let mut c = Container::new(r);
        s.load_contents_details(&mut c).unwrap();
        assert_eq!(c.resource_names, vec!(".acl".to_string(), "notes".to_string(), "sub/".to_string()));
        assert_eq!(c.resources.len(), 3);
        assert!(c.has_content());
    }

    #[test]
    fn test_listing_details_from_one_scan() {
        let d = tempdir().unwrap();
        fs::create_dir_all(d.path().join("c").join("sub")).unwrap();
        fs::write(d.path().join("c").join("notes$.ttl"), b"<a> <b> <c> .").unwrap();
        fs::write(d.path().join("c").join("a.txt"), b"hello").unwrap();
        fs::write(d.path().join("c").join("a.txt$.html"), b"<p>").unwrap();
        let s = store(d.path());
        let r = s.resource(&target("https://pod.example/c/")).unwrap();
        let mut c = Container::new(r);
        s.load_contents_details(&mut c).unwrap();
        assert_eq!(c.resource_names, vec!("a.txt".to_string(), "notes".to_string(), "sub/".to_string()));

        let urls: Vec<String> = c.resources.iter().map(|r| r.target.location()).collect();
        assert_eq!(urls, vec!(
            "https://pod.example/c/a.txt".to_string(),
            "https://pod.example/c/notes".to_string(),
            "https://pod.example/c/sub/".to_string(),
        ));
        assert_eq!(c.resources[0].content_type, "text/plain");
        assert_eq!(c.resources[0].size, 5);
        assert_eq!(c.resources[1].content_type, "text/turtle");
        assert!(c.resources[2].is_container);
        for child in c.resources.iter() {
            let single = s.resource(&child.target).unwrap();
            assert_eq!(single.path, child.path);
            assert_eq!(single.content_type, child.content_type);
        }
    }

    #[test]
    fn test_range_read() {
        let d = tempdir().unwrap();
        fs::write(d.path().join("r.txt"), b"0123456789").unwrap();
        let s = store(d.path());
        let r = s.resource(&target("https://pod.example/r.txt")).unwrap();
        let mut out = String::new();
        s.create_read_stream(&r, Some((2, 4))).unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "234");
    }

    #[test]
    fn test_slug_collision() {
        let d = tempdir().unwrap();
        let s = store(d.path());
        let c = target("https://pod.example/c/");
        s.ensure_container(&c).unwrap();
        let first = s.target_from_slug(Some("foo"), &c, "text/turtle", false).unwrap();
        assert_eq!(first.location(), "https://pod.example/c/foo.ttl");
        let planned = s.add_resource(&first, "text/turtle").unwrap();
        s.write_blob(&planned, b"").unwrap();
        let second = s.target_from_slug(Some("foo"), &c, "text/turtle", false).unwrap();
        assert_ne!(second.location(), first.location());
        assert!(second.location().starts_with("https://pod.example/c/foo-"));
        assert!(second.location().ends_with(".ttl"));
    }

    #[test]
    fn test_clash_with_container() {
        let d = tempdir().unwrap();
        fs::create_dir_all(d.path().join("c")).unwrap();
        fs::write(d.path().join("f"), b"").unwrap();
        let s = store(d.path());
        assert!(s.clashes(&target("https://pod.example/c")).unwrap());
        assert!(s.clashes(&target("https://pod.example/f/x")).unwrap());
        assert!(!s.clashes(&target("https://pod.example/c/x")).unwrap());
    }
}
