//! The `mock` auth module is provided to facilitate testing.
//!
//! It handles the `WebID` authorization scheme, where the header value is
//! taken to be the agent's WebID without any proof:
//!
//! ``` ignore,
//! Authorization: WebID https://alice.example/profile/card#me
//! ```
use std::str::FromStr;

use crate::auth::{
    web_id,
    AuthError,
    AuthSpec,
    Authenticator,
    Credentials,
};
use crate::request::RequestHeaders;

pub struct WebIdScheme;

/// Verifies the given [auth::AuthSpec](crate::auth::AuthSpec) structure against the `WebID` scheme.
pub fn auth_check(auth: &AuthSpec) -> Result<Credentials, AuthError> {
    if !auth.method.eq_ignore_ascii_case("webid") {
        return Err(AuthError {
            v: format!("scheme {} is not WebID", auth.method),
        });
    }
    Ok(Credentials::agent(&web_id(&auth.value)?))
}

impl Authenticator for WebIdScheme {
    fn authenticate(&self, headers: &RequestHeaders) -> Result<Option<Credentials>, AuthError> {
        let spec = match headers.get("Authorization").map(AuthSpec::from_str) {
            Some(Ok(v)) => v,
            _ => return Ok(None),
        };
        if !spec.method.eq_ignore_ascii_case("webid") {
            return Ok(None);
        }
        auth_check(&spec).map(Some)
    }
}
