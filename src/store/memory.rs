use std::collections::BTreeMap;
use std::io;
use std::io::{
    Cursor,
    Read,
    Write,
};
use std::sync::{
    Arc,
    RwLock,
};
use std::time::SystemTime;

use log::debug;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::RequestError;
use crate::mapper::content_type_for_name;
use crate::rdf::TEXT_TURTLE;
use crate::target::Target;
use super::{
    Container,
    Resource,
    Store,
    WriteStream,
};

#[derive(Clone, Debug)]
struct Entry {
    data: Vec<u8>,
    content_type: String,
    modified: SystemTime,
}

type Entries = Arc<RwLock<BTreeMap<String, Entry>>>;

/// Resources held in a map keyed by location. Containers are keys ending in `/`.
pub struct MemoryStore {
    entries: Entries,
}

struct MemoryWriteStream {
    entries: Entries,
    location: String,
    content_type: String,
    data: Vec<u8>,
}

fn poisoned() -> RequestError {
    RequestError::internal("store lock poisoned")
}

fn container_entry() -> Entry {
    Entry {
        data: vec!(),
        content_type: TEXT_TURTLE.to_string(),
        modified: SystemTime::now(),
    }
}

/// Locations of all containers above `location`, root included.
fn ancestors(location: &str) -> Vec<String> {
    let mut v = vec!();
    let url = match Url::parse(location) {
        Ok(u) => u,
        Err(_) => return v,
    };
    let mut t = Target::from_url(url).parent();
    while let Some(p) = t {
        v.push(p.location());
        t = p.parent();
    }
    v
}

impl Write for MemoryWriteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteStream for MemoryWriteStream {
    fn commit(self: Box<Self>) -> Result<(), RequestError> {
        let s = *self;
        let mut entries = match s.entries.write() {
            Ok(v) => v,
            Err(_) => return Err(poisoned()),
        };
        for a in ancestors(&s.location) {
            entries.entry(a).or_insert_with(container_entry);
        }
        debug!("memory commit {} ({} bytes)", s.location, s.data.len());
        entries.insert(s.location, Entry {
            data: s.data,
            content_type: s.content_type,
            modified: SystemTime::now(),
        });
        Ok(())
    }
}

impl MemoryStore {
    /// An empty store holding only the root container at `root`.
    pub fn new(root: &Url) -> MemoryStore {
        let mut m = BTreeMap::new();
        m.insert(root.to_string(), container_entry());
        MemoryStore {
            entries: Arc::new(RwLock::new(m)),
        }
    }
}

impl Store for MemoryStore {
    fn resource(&self, target: &Target) -> Result<Resource, RequestError> {
        let entries = match self.entries.read() {
            Ok(v) => v,
            Err(_) => return Err(poisoned()),
        };
        let entry = match entries.get(&target.location()) {
            Some(v) => v,
            None => return Ok(Resource::absent(target)),
        };
        Ok(Resource {
            target: target.clone(),
            exists: true,
            is_container: target.is_container(),
            content_type: entry.content_type.clone(),
            size: entry.data.len() as u64,
            modified: Some(entry.modified),
            path: None,
            replaces: None,
        })
    }

    fn add_resource(&self, target: &Target, content_type: &str) -> Result<Resource, RequestError> {
        let mut r = self.resource(target)?;
        r.content_type = if target.is_container() {
            TEXT_TURTLE.to_string()
        } else if content_type.is_empty() {
            content_type_for_name(&target.name)
        } else {
            crate::rdf::essence(content_type)
        };
        Ok(r)
    }

    fn ensure_container(&self, container: &Target) -> Result<bool, RequestError> {
        let mut entries = match self.entries.write() {
            Ok(v) => v,
            Err(_) => return Err(poisoned()),
        };
        let location = container.location();
        if entries.contains_key(&location) {
            return Ok(false);
        }
        for a in ancestors(&location) {
            entries.entry(a).or_insert_with(container_entry);
        }
        entries.insert(location, container_entry());
        Ok(true)
    }

    fn create_read_stream(&self, resource: &Resource, range: Option<(u64, u64)>) -> Result<Box<dyn Read + Send>, RequestError> {
        let entries = match self.entries.read() {
            Ok(v) => v,
            Err(_) => return Err(poisoned()),
        };
        let data = match entries.get(&resource.target.location()) {
            Some(e) => e.data.clone(),
            None => {
                return Err(RequestError::not_found(&format!("{} not found", resource.target.url)));
            },
        };
        let data = match range {
            Some((start, end)) => {
                let end = std::cmp::min(end as usize + 1, data.len());
                let start = std::cmp::min(start as usize, end);
                data[start..end].to_vec()
            },
            None => data,
        };
        Ok(Box::new(Cursor::new(data)))
    }

    fn create_write_stream(&self, resource: &Resource) -> Result<Box<dyn WriteStream>, RequestError> {
        Ok(Box::new(MemoryWriteStream {
            entries: Arc::clone(&self.entries),
            location: resource.target.location(),
            content_type: resource.content_type.clone(),
            data: vec!(),
        }))
    }

    fn load_contents_list(&self, container: &mut Container) -> Result<(), RequestError> {
        let entries = match self.entries.read() {
            Ok(v) => v,
            Err(_) => return Err(poisoned()),
        };
        let prefix = container.resource.target.location();
        let mut names = vec!();
        for k in entries.keys() {
            let rest = match k.strip_prefix(&prefix) {
                Some(v) if !v.is_empty() => v,
                _ => continue,
            };
            let bare = rest.trim_end_matches('/');
            if bare.contains('/') {
                continue;
            }
            let mut name = percent_decode_str(bare).decode_utf8_lossy().to_string();
            if rest.ends_with('/') {
                name.push('/');
            }
            names.push(name);
        }
        container.resource_names = names;
        Ok(())
    }

    fn delete_resource(&self, resource: &Resource) -> Result<(), RequestError> {
        let mut entries = match self.entries.write() {
            Ok(v) => v,
            Err(_) => return Err(poisoned()),
        };
        match entries.remove(&resource.target.location()) {
            Some(_) => Ok(()),
            None => Err(RequestError::not_found(&format!("{} not found", resource.target.url))),
        }
    }

    fn delete_container(&self, container: &Resource) -> Result<(), RequestError> {
        let mut entries = match self.entries.write() {
            Ok(v) => v,
            Err(_) => return Err(poisoned()),
        };
        let prefix = container.target.location();
        entries.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}
