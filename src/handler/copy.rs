use log::{
    debug,
    info,
};
use url::Url;

use crate::auth::wac::Mode;
use crate::error::{
    RequestError,
    RequestErrorType,
};
use crate::response::RequestResult;
use crate::target::{
    check_segments,
    Target,
};
use super::{
    written,
    Exchange,
    RequestKind,
};

pub fn select(ex: &mut Exchange) -> Result<RequestKind, RequestError> {
    let source = match ex.headers.get("Source") {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return Err(RequestError::bad_request("COPY needs a Source header")),
    };
    let url = match ex.target.url.join(&source) {
        Ok(v) => v,
        Err(e) => {
            return Err(RequestError::bad_request(&format!("invalid Source {}: {}", source, e)));
        },
    };
    match url.scheme() {
        "http" | "https" => {},
        s => {
            return Err(RequestError::bad_request(&format!("unsupported Source scheme {}", s)));
        },
    };
    Ok(RequestKind::Copy(Target::from_url(url)))
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

fn copy_local(ex: &mut Exchange, source: &Target) -> Result<(), RequestError> {
    check_segments(source.path())?;
    let mode = if source.is_acl() { Mode::Control } else { Mode::Read };
    ex.wac().allow(source, &[mode], &ex.credentials)?;
    let from = ex.store.resource(source)?;
    if !from.exists {
        return Err(RequestError::not_found(&format!("source {} not found", source.url)));
    }
    if from.is_container {
        return Err(RequestError::bad_request("cannot copy a container"));
    }
    let to = ex.store.add_resource(&ex.target, &from.content_type)?;
    let n = ex.store.copy_resource(&from, &to)?;
    debug!("copied {} bytes from {}", n, source.url);
    Ok(())
}

fn copy_remote(ex: &mut Exchange, source: &Target) -> Result<(), RequestError> {
    let response = match ureq::get(source.url.as_str()).call() {
        Ok(v) => v,
        Err(ureq::Error::Status(404, _)) => {
            return Err(RequestError::not_found(&format!("source {} not found", source.url)));
        },
        Err(ureq::Error::Status(code, _)) => {
            return Err(RequestError::bad_request(&format!("source {} answered {}", source.url, code)));
        },
        Err(ureq::Error::Transport(e)) => {
            return Err(RequestError::bad_request(&format!("cannot fetch {}: {}", source.url, e)));
        },
    };
    let content_type = response.content_type().to_string();
    let mut reader = response.into_reader();
    let to = ex.store.add_resource(&ex.target, &content_type)?;
    let n = ex.store.write_resource_stream(&to, &mut reader, None)?;
    debug!("fetched {} bytes of {} from {}", n, content_type, source.url);
    Ok(())
}

pub fn perform(ex: &mut Exchange, source: Target) -> Result<RequestResult, RequestError> {
    if ex.target.is_container() {
        return Err(RequestError::new(RequestErrorType::BadRequest, "COPY destination must not be a container"));
    }
    if ex.store.clashes(&ex.target)? {
        return Err(RequestError::conflict(&format!("{} clashes with an existing resource", ex.target.url)));
    }
    let existed = ex.resource.exists;
    if same_origin(&source.url, &ex.target.url) {
        copy_local(ex, &source)?;
    } else {
        copy_remote(ex, &source)?;
    }
    info!("copied {} to {}", source.url, ex.target.url);
    Ok(written(&ex.target, existed))
}
