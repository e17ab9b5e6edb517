use crate::error::RequestError;
use crate::patch::ACCEPT_PATCH;
use crate::response::{
    RequestResult,
    ALLOW,
};
use super::{
    Exchange,
    RequestKind,
};

pub fn select(_ex: &mut Exchange) -> Result<RequestKind, RequestError> {
    Ok(RequestKind::Options)
}

/// Capabilities of the target, whether it exists or not.
pub fn perform(ex: &mut Exchange) -> Result<RequestResult, RequestError> {
    let mut r = RequestResult::new(204);
    r.add_header("Allow", ALLOW);
    r.add_header("Accept-Patch", ACCEPT_PATCH);
    if ex.target.is_container() {
        r.add_header("Accept-Post", "*/*");
    }
    let mut service = ex.target.url.clone();
    service.set_path("/.well-known/solid");
    service.set_query(None);
    r.add_header("Link", &format!("<{}>; rel=\"service\"", service));
    r.add_header(
        "Link",
        &format!("<{}>; rel=\"http://openid.net/specs/connect/1.0/issuer\"", ex.settings.issuer()),
    );
    Ok(r)
}
