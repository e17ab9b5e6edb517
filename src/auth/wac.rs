//! Web Access Control.
//!
//! The ACL governing a resource is its own `.acl` if that exists, else the
//! `.acl` of the nearest ancestor container that has one. Authorizations
//! found in an ancestor's ACL count only when they are marked `acl:default`
//! (or the older `acl:defaultForNew`) for that ancestor. Evaluation never
//! writes to the store.

use std::collections::BTreeSet;

use log::{
    debug,
    info,
    warn,
};
use url::Url;

use crate::auth::Credentials;
use crate::error::{
    RequestError,
    RequestErrorType,
};
use crate::rdf::{
    self,
    Graph,
    Term,
    ACL,
    FOAF,
    RDF_TYPE,
    VCARD,
};
use crate::store::Store;
use crate::target::Target;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    Read,
    Write,
    Append,
    Control,
}

impl Mode {
    pub fn iri(&self) -> String {
        let local = match self {
            Mode::Read => "Read",
            Mode::Write => "Write",
            Mode::Append => "Append",
            Mode::Control => "Control",
        };
        format!("{}{}", ACL, local)
    }

    pub fn from_iri(iri: &str) -> Option<Mode> {
        match iri.strip_prefix(ACL) {
            Some("Read") => Some(Mode::Read),
            Some("Write") => Some(Mode::Write),
            Some("Append") => Some(Mode::Append),
            Some("Control") => Some(Mode::Control),
            _ => None,
        }
    }

    /// Token used in the `WAC-Allow` header.
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Write => "write",
            Mode::Append => "append",
            Mode::Control => "control",
        }
    }
}

/// Modes granted to an agent, closed under implication.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PermissionSet {
    modes: BTreeSet<Mode>,
}

impl PermissionSet {
    pub fn new() -> PermissionSet {
        PermissionSet::default()
    }

    pub fn grant(&mut self, mode: Mode) {
        self.modes.insert(mode);
        match mode {
            Mode::Control => {
                self.modes.insert(Mode::Read);
                self.modes.insert(Mode::Write);
                self.modes.insert(Mode::Append);
            },
            Mode::Write => {
                self.modes.insert(Mode::Append);
            },
            _ => {},
        }
    }

    pub fn has(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }

    pub fn has_all(&self, required: &[Mode]) -> bool {
        required.iter().all(|m| self.has(*m))
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Space separated mode names, as in `WAC-Allow`.
    pub fn names(&self) -> String {
        let v: Vec<&str> = self.modes.iter().map(|m| m.name()).collect();
        v.join(" ")
    }
}

/// The ACL in effect for a resource.
#[derive(Clone, Debug)]
pub struct AclDocument {
    pub acl: Target,
    /// The resource the ACL belongs to: the subject itself or an ancestor.
    pub owner: Target,
    pub inherited: bool,
    pub graph: Graph,
}

/// `…/c/` and `…/c` name the same container in an ACL.
fn same_resource(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

pub struct Wac<'a> {
    store: &'a dyn Store,
}

impl<'a> Wac<'a> {
    pub fn new(store: &'a dyn Store) -> Wac<'a> {
        Wac {
            store,
        }
    }

    /// Locate the ACL governing `target`. ACL and metadata files are governed
    /// by the ACL of the resource they belong to.
    pub fn find_acl(&self, target: &Target) -> Result<Option<AclDocument>, RequestError> {
        let subject = target.subject();
        let mut current = Some(subject.clone());
        while let Some(t) = current {
            if let Some(acl) = t.acl_target() {
                let r = self.store.resource(&acl)?;
                if r.exists {
                    let graph = match self.store.load_parsed_graph(&r) {
                        Ok(g) => g,
                        Err(e) => {
                            warn!("unreadable acl {}: {}", acl.url, e);
                            Graph::new()
                        },
                    };
                    debug!("acl for {} is {}", subject.url, acl.url);
                    return Ok(Some(AclDocument {
                        inherited: t.location() != subject.location(),
                        acl,
                        owner: t,
                        graph,
                    }));
                }
            }
            current = t.parent();
        }
        debug!("no acl governs {}", subject.url);
        Ok(None)
    }

    fn is_member(&self, group: &str, web_id: &str, context: &Target) -> bool {
        let mut url = match Url::parse(group) {
            Ok(v) => v,
            Err(_) => return false,
        };
        if !same_origin(&url, &context.url) {
            debug!("ignoring foreign group {}", group);
            return false;
        }
        url.set_fragment(None);
        let doc = Target::from_url(url);
        let graph = match self.store.resource(&doc).and_then(|r| self.store.load_parsed_graph(&r)) {
            Ok(g) => g,
            Err(e) => {
                warn!("cannot load group {}: {}", group, e);
                return false;
            },
        };
        graph.objects(&Term::iri(group), &format!("{}hasMember", VCARD)).iter().any(|m| m.as_iri() == Some(web_id))
    }

    fn agent_matches(&self, graph: &Graph, auth: &Term, credentials: &Credentials, context: &Target) -> bool {
        let class_pred = format!("{}agentClass", ACL);
        for class in graph.objects(auth, &class_pred).iter() {
            match class.as_iri() {
                Some(c) if c == format!("{}Agent", FOAF) => return true,
                Some(c) if c == format!("{}AuthenticatedAgent", ACL) && credentials.is_authenticated() => return true,
                _ => {},
            }
        }
        let web_id = match &credentials.web_id {
            Some(v) => v,
            None => return false,
        };
        if graph.objects(auth, &format!("{}agent", ACL)).iter().any(|a| a.as_iri() == Some(web_id.as_str())) {
            return true;
        }
        for group in graph.objects(auth, &format!("{}agentGroup", ACL)).iter() {
            if let Some(g) = group.as_iri() {
                if self.is_member(g, web_id, context) {
                    return true;
                }
            }
        }
        false
    }

    fn applies(&self, doc: &AclDocument, auth: &Term) -> bool {
        let owner = doc.owner.location();
        let preds = if doc.inherited {
            vec!(format!("{}default", ACL), format!("{}defaultForNew", ACL))
        } else {
            vec!(format!("{}accessTo", ACL))
        };
        preds.iter().any(|p| {
            doc.graph.objects(auth, p).iter().any(|o| match o.as_iri() {
                Some(v) => same_resource(v, &owner),
                None => false,
            })
        })
    }

    /// Everything `credentials` may do on `target`.
    pub fn permissions(&self, target: &Target, credentials: &Credentials) -> Result<PermissionSet, RequestError> {
        let doc = match self.find_acl(target)? {
            Some(v) => v,
            None => return Ok(PermissionSet::new()),
        };
        Ok(self.evaluate(&doc, target, credentials))
    }

    fn evaluate(&self, doc: &AclDocument, target: &Target, credentials: &Credentials) -> PermissionSet {
        let mut set = PermissionSet::new();
        let mut auths: Vec<Term> = doc.graph.subjects(RDF_TYPE, &Term::iri(&format!("{}Authorization", ACL)));
        for t in doc.graph.matching(None, Some(&Term::iri(&format!("{}mode", ACL))), None) {
            if !auths.contains(&t.subject) {
                auths.push(t.subject.clone());
            }
        }
        for auth in auths.iter() {
            if !self.applies(doc, auth) || !self.agent_matches(&doc.graph, auth, credentials, target) {
                continue;
            }
            for m in doc.graph.objects(auth, &format!("{}mode", ACL)).iter() {
                if let Some(mode) = m.as_iri().and_then(Mode::from_iri) {
                    set.grant(mode);
                }
            }
        }
        set
    }

    /// Check that `credentials` hold every mode in `required` on `target`.
    ///
    /// Fails with 401 for anonymous requests and 403 for authenticated ones.
    pub fn allow(&self, target: &Target, required: &[Mode], credentials: &Credentials) -> Result<PermissionSet, RequestError> {
        let set = self.permissions(target, credentials)?;
        if set.has_all(required) {
            return Ok(set);
        }
        let wanted: Vec<&str> = required.iter().map(|m| m.name()).collect();
        debug!("denied {} on {} for {:?}, has [{}]", wanted.join(" "), target.url, credentials.web_id, set.names());
        if credentials.is_authenticated() {
            Err(RequestError::new(RequestErrorType::Forbidden, &format!("no {} access to {}", wanted.join(" "), target.url)))
        } else {
            Err(RequestError::new(RequestErrorType::Unauthorized, &format!("authentication required for {}", target.url)))
        }
    }

    /// Value of the `WAC-Allow` header for `target`.
    pub fn wac_allow(&self, target: &Target, credentials: &Credentials) -> Result<String, RequestError> {
        let doc = match self.find_acl(target)? {
            Some(v) => v,
            None => return Ok("user=\"\",public=\"\"".to_string()),
        };
        let user = self.evaluate(&doc, target, credentials);
        let public = self.evaluate(&doc, target, &Credentials::anonymous());
        Ok(format!("user=\"{}\",public=\"{}\"", user.names(), public.names()))
    }
}

/// ACL giving `owner` full control of `root` and everything below it, and
/// the public read access.
pub fn root_acl(root: &Url, owner: &str) -> Graph {
    let acl = format!("{}.acl", root);
    let mut g = Graph::new();
    let owner_auth = Term::iri(&format!("{}#owner", acl));
    g.add(owner_auth.clone(), RDF_TYPE, Term::iri(&format!("{}Authorization", ACL)));
    g.add(owner_auth.clone(), &format!("{}agent", ACL), Term::iri(owner));
    g.add(owner_auth.clone(), &format!("{}accessTo", ACL), Term::iri(root.as_str()));
    g.add(owner_auth.clone(), &format!("{}default", ACL), Term::iri(root.as_str()));
    for m in [Mode::Read, Mode::Write, Mode::Control].iter() {
        g.add(owner_auth.clone(), &format!("{}mode", ACL), Term::iri(&m.iri()));
    }
    let public = Term::iri(&format!("{}#public", acl));
    g.add(public.clone(), RDF_TYPE, Term::iri(&format!("{}Authorization", ACL)));
    g.add(public.clone(), &format!("{}agentClass", ACL), Term::iri(&format!("{}Agent", FOAF)));
    g.add(public.clone(), &format!("{}accessTo", ACL), Term::iri(root.as_str()));
    g.add(public.clone(), &format!("{}default", ACL), Term::iri(root.as_str()));
    g.add(public, &format!("{}mode", ACL), Term::iri(&Mode::Read.iri()));
    g
}

/// Write [root_acl](root_acl) unless the root already has an ACL. Returns true if written.
pub fn bootstrap_root_acl(store: &dyn Store, root: &Url, owner: &str) -> Result<bool, RequestError> {
    let root_target = Target::from_url(root.clone());
    store.ensure_container(&root_target)?;
    let acl = match root_target.acl_target() {
        Some(v) => v,
        None => return Err(RequestError::internal("root has no acl url")),
    };
    if store.exists(&acl)? {
        return Ok(false);
    }
    let r = store.add_resource(&acl, rdf::TEXT_TURTLE)?;
    store.write_graph(&r, &root_acl(root, owner))?;
    info!("created root acl {} for owner {}", acl.url, owner);
    Ok(true)
}
