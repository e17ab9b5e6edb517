use log::{
    debug,
    info,
};

use crate::error::RequestError;
use crate::response::RequestResult;
use crate::store::Container;
use super::{
    Exchange,
    RequestKind,
};

pub fn select(ex: &mut Exchange) -> Result<RequestKind, RequestError> {
    if ex.target.is_root() || (ex.target.is_acl() && ex.target.subject().is_root()) {
        return Err(RequestError::forbidden("the root container and its acl cannot be deleted"));
    }
    Ok(RequestKind::Delete)
}

pub fn perform(ex: &mut Exchange) -> Result<RequestResult, RequestError> {
    if !ex.resource.exists {
        return Err(RequestError::not_found(&format!("{} not found", ex.target.url)));
    }
    if ex.resource.is_container {
        let mut c = Container::new(ex.resource.clone());
        ex.store.load_contents_list(&mut c)?;
        if c.has_content() {
            return Err(RequestError::conflict(&format!("container {} is not empty", ex.target.url)));
        }
        ex.store.delete_container(&ex.resource)?;
        info!("deleted container {}", ex.target.url);
        return Ok(RequestResult::new(200));
    }
    ex.store.delete_resource(&ex.resource)?;
    if !ex.target.is_auxiliary() {
        let siblings = vec!(ex.target.acl_target(), ex.target.meta_target());
        for s in siblings.into_iter().flatten() {
            let r = ex.store.resource(&s)?;
            if r.exists {
                ex.store.delete_resource(&r)?;
                debug!("removed sibling {}", s.url);
            }
        }
    }
    info!("deleted {}", ex.target.url);
    Ok(RequestResult::new(200))
}
