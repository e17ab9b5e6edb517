use log::debug;

use crate::error::{
    RequestError,
    RequestErrorType,
};
use crate::mapper::{
    content_type_for_name,
    DEFAULT_CONTENT_TYPE,
};
use crate::patch::{
    apply_patch,
    parse_patch,
    PatchObject,
};
use crate::rdf;
use crate::response::RequestResult;
use super::{
    Exchange,
    RequestKind,
};

/// Parses the body up front: the patch decides which modes are needed.
pub fn select(ex: &mut Exchange) -> Result<RequestKind, RequestError> {
    if ex.target.is_container() {
        return Err(RequestError::new(RequestErrorType::MethodNotAllowed, "containers cannot be patched"));
    }
    let content_type = match &ex.target.body_content_type {
        Some(v) => v.clone(),
        None => {
            return Err(RequestError::new(RequestErrorType::UnsupportedMediaType, "PATCH without content type"));
        },
    };
    let text = ex.read_body_text()?;
    let patch = parse_patch(&text, &content_type, &ex.target.location())?;
    Ok(RequestKind::Patch(patch))
}

/// Serialization of a resource PATCH is about to create.
fn new_content_type(name: &str) -> Result<String, RequestError> {
    let ct = content_type_for_name(name);
    if ct == DEFAULT_CONTENT_TYPE {
        return Ok(rdf::TEXT_TURTLE.to_string());
    }
    if rdf::is_translatable(&ct) {
        return Ok(ct);
    }
    Err(RequestError::new(
        RequestErrorType::UnsupportedMediaType,
        &format!("cannot create {} as RDF", name),
    ))
}

pub fn perform(ex: &mut Exchange, patch: PatchObject) -> Result<RequestResult, RequestError> {
    let existed = ex.resource.exists;
    let resource = if existed {
        if !rdf::is_translatable(&ex.resource.content_type) {
            return Err(RequestError::new(
                RequestErrorType::UnsupportedMediaType,
                &format!("cannot patch {} content", ex.resource.content_type),
            ));
        }
        ex.resource.clone()
    } else {
        if ex.store.clashes(&ex.target)? {
            return Err(RequestError::conflict(&format!("{} clashes with an existing resource", ex.target.url)));
        }
        let ct = new_content_type(&ex.target.name)?;
        ex.store.add_resource(&ex.target, &ct)?
    };
    let mut graph = ex.store.load_parsed_graph(&ex.resource)?;
    apply_patch(&patch, &mut graph)?;
    ex.store.write_graph(&resource, &graph)?;
    debug!("patched {} ({} triples)", ex.target.url, graph.len());

    let mut res = if existed {
        RequestResult::with_body(200, "text/plain; charset=utf-8", b"Patch applied successfully.\n".to_vec())
    } else {
        let mut r = RequestResult::new(201);
        r.add_header("Location", &ex.target.location());
        r
    };
    res.add_header("MS-Author-Via", "SPARQL");
    Ok(res)
}
