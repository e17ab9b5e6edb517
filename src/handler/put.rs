use log::{
    debug,
    info,
};
use percent_encoding::percent_decode_str;

use crate::error::{
    RequestError,
    RequestErrorType,
};
use crate::mapper::content_type_for_name;
use crate::multipart;
use crate::rdf;
use crate::response::RequestResult;
use crate::target::{
    wants_container,
    Target,
};
use super::{
    written,
    Exchange,
    RequestKind,
};

pub fn select_put(_ex: &mut Exchange) -> Result<RequestKind, RequestError> {
    Ok(RequestKind::Put)
}

pub fn select_post(ex: &mut Exchange) -> Result<RequestKind, RequestError> {
    if !ex.target.is_container() {
        return Err(RequestError::new(
            RequestErrorType::MethodNotAllowed,
            &format!("POST needs a container, {} is not one", ex.target.url),
        ));
    }
    Ok(RequestKind::Post)
}

/// Content type of the request body, or the one implied by `target`'s name.
fn body_content_type(ex: &Exchange, target: &Target) -> String {
    match &ex.target.body_content_type {
        Some(v) if !v.trim().is_empty() => rdf::essence(v),
        _ => content_type_for_name(&target.name),
    }
}

pub fn perform_put(ex: &mut Exchange) -> Result<RequestResult, RequestError> {
    let target = ex.target.clone();
    if ex.store.clashes(&target)? {
        return Err(RequestError::conflict(&format!("{} clashes with an existing resource", target.url)));
    }
    if target.is_container() {
        let created = ex.store.ensure_container(&target)?;
        return Ok(written(&target, !created));
    }
    let existed = ex.resource.exists;
    if target.is_acl() {
        let text = ex.read_body_text()?;
        match rdf::parse(&text, rdf::TEXT_TURTLE, &target.location()) {
            Ok(_) => {},
            Err(e) => {
                return Err(RequestError::bad_request(&format!("invalid acl: {}", e.message())));
            },
        };
        let r = ex.store.add_resource(&target, rdf::TEXT_TURTLE)?;
        ex.store.write_blob(&r, text.as_bytes())?;
        info!("acl {} updated", target.url);
        return Ok(written(&target, existed));
    }
    let content_type = body_content_type(ex, &target);
    let r = ex.store.add_resource(&target, &content_type)?;
    let n = ex.store.write_resource_stream(&r, &mut *ex.body, ex.body_length)?;
    debug!("put {} bytes of {} to {}", n, content_type, target.url);
    Ok(written(&target, existed))
}

fn post_multipart(ex: &mut Exchange, content_type: &str) -> Result<RequestResult, RequestError> {
    let boundary = multipart::boundary(content_type)?;
    let data = ex.read_body()?;
    let parts = multipart::parse(&data, &boundary)?;
    if parts.is_empty() {
        return Err(RequestError::bad_request("multipart body has no files"));
    }
    let mut locations = vec!();
    for p in parts.iter() {
        let filename = p.filename.clone().unwrap_or_default();
        let ct = match &p.content_type {
            Some(v) => rdf::essence(v),
            None => content_type_for_name(&filename),
        };
        let child = ex.store.target_from_slug(Some(&filename), &ex.target, &ct, false)?;
        if child.is_auxiliary() {
            return Err(RequestError::bad_request(&format!("cannot POST auxiliary resource {}", filename)));
        }
        let r = ex.store.add_resource(&child, &ct)?;
        ex.store.write_blob(&r, &p.data)?;
        debug!("multipart file {} stored at {}", filename, child.url);
        locations.push(child.location());
    }
    let mut body = locations.join("\n");
    body.push('\n');
    let mut res = RequestResult::with_body(201, "text/plain; charset=utf-8", body.into_bytes());
    res.add_header("Location", &locations[0]);
    Ok(res)
}

pub fn perform_post(ex: &mut Exchange) -> Result<RequestResult, RequestError> {
    if !ex.resource.exists {
        return Err(RequestError::not_found(&format!("container {} not found", ex.target.url)));
    }
    let body_type = ex.target.body_content_type.clone();
    if multipart::is_multipart(body_type.as_deref()) {
        return post_multipart(ex, body_type.as_deref().unwrap_or(""));
    }
    let is_container = wants_container(ex.headers.get("Link"));
    let content_type = match &body_type {
        Some(v) if !v.trim().is_empty() => rdf::essence(v),
        _ => crate::mapper::DEFAULT_CONTENT_TYPE.to_string(),
    };
    let slug = ex.headers.get("Slug").map(|s| percent_decode_str(s).decode_utf8_lossy().to_string());
    let child = ex.store.target_from_slug(slug.as_deref(), &ex.target, &content_type, is_container)?;
    if child.is_auxiliary() {
        return Err(RequestError::bad_request(&format!("cannot POST auxiliary resource {}", child.url)));
    }
    if is_container {
        ex.store.ensure_container(&child)?;
    } else {
        let r = ex.store.add_resource(&child, &content_type)?;
        ex.store.write_resource_stream(&r, &mut *ex.body, ex.body_length)?;
    }
    info!("created {}", child.url);
    let mut res = RequestResult::new(201);
    res.add_header("Location", &child.location());
    Ok(res)
}
