//! Identification of the requesting agent.
//!
//! An [Authenticator](Authenticator) inspects the request headers and, if
//! it recognises them, yields [Credentials](Credentials). Requests nobody
//! recognises are anonymous. What the agent may then do is decided by the
//! [wac](crate::auth::wac) engine.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use log::debug;
use url::Url;

use crate::arg::Settings;
use crate::error::{
    RequestError,
    RequestErrorType,
};
use crate::request::RequestHeaders;

/// Web Access Control evaluation.
pub mod wac;

#[cfg(feature = "dev")]
/// `WebID` authorization scheme for development and tests.
pub mod mock;

/// The parsed `Authorization` header.
pub struct AuthSpec {
    pub method: String,
    pub value: String,
}

#[derive(Debug)]
pub struct AuthSpecError;

impl Error for AuthSpecError {
    fn description(&self) -> &str {
        "auth string malformed"
    }
}

impl fmt::Display for AuthSpecError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str("auth string malformed")
    }
}

impl FromStr for AuthSpec {
    type Err = AuthSpecError;

    fn from_str(s: &str) -> Result<AuthSpec, AuthSpecError> {
        let mut auth_fields = s.trim().splitn(2, ' ');
        let method = match auth_fields.next() {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => return Err(AuthSpecError{}),
        };
        let value = match auth_fields.next() {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => return Err(AuthSpecError{}),
        };
        Ok(AuthSpec {
            method,
            value,
        })
    }
}

impl fmt::Debug for AuthSpec {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} ({} bytes)", self.method, self.value.len())
    }
}

/// Who is asking. No WebID means the public.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Credentials {
    pub web_id: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Credentials {
        Credentials {
            web_id: None,
        }
    }

    pub fn agent(web_id: &str) -> Credentials {
        Credentials {
            web_id: Some(web_id.to_string()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.web_id.is_some()
    }
}

#[derive(Debug)]
pub struct AuthError {
    pub v: String,
}

impl Error for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "authentication failed: {}", self.v)
    }
}

pub trait Authenticator: Send + Sync {
    /// Credentials for the request, None if this authenticator does not apply.
    fn authenticate(&self, headers: &RequestHeaders) -> Result<Option<Credentials>, AuthError>;
}

pub(crate) fn web_id(s: &str) -> Result<String, AuthError> {
    match Url::parse(s.trim()) {
        Ok(u) if u.scheme() == "https" || u.scheme() == "http" => Ok(u.to_string()),
        _ => Err(AuthError {
            v: format!("not a WebID: {}", s),
        }),
    }
}

/// Takes the WebID from a header set by an authenticating proxy in front of the server.
pub struct TrustedHeader {
    header: String,
}

impl TrustedHeader {
    pub fn new(header: &str) -> TrustedHeader {
        TrustedHeader {
            header: header.to_string(),
        }
    }
}

impl Authenticator for TrustedHeader {
    fn authenticate(&self, headers: &RequestHeaders) -> Result<Option<Credentials>, AuthError> {
        match headers.get(&self.header) {
            Some(v) => Ok(Some(Credentials::agent(&web_id(v)?))),
            None => Ok(None),
        }
    }
}

/// The authenticators enabled by `settings`, in the order they are consulted.
pub fn authenticators(settings: &Settings) -> Vec<Box<dyn Authenticator>> {
    let mut v: Vec<Box<dyn Authenticator>> = vec!();
    if let Some(h) = &settings.webid_header {
        v.push(Box::new(TrustedHeader::new(h)));
    }
    #[cfg(feature = "dev")]
    v.push(Box::new(mock::WebIdScheme{}));
    v
}

/// Credentials from the first authenticator that recognises the request.
pub fn credentials(authenticators: &[Box<dyn Authenticator>], headers: &RequestHeaders) -> Result<Credentials, RequestError> {
    for a in authenticators.iter() {
        match a.authenticate(headers) {
            Ok(Some(c)) => {
                debug!("authenticated as {:?}", c.web_id);
                return Ok(c);
            },
            Ok(None) => {},
            Err(e) => {
                return Err(RequestError::new(RequestErrorType::Unauthorized, &e.to_string()));
            },
        }
    }
    if let Some(v) = headers.get("Authorization") {
        match AuthSpec::from_str(v) {
            Ok(spec) => debug!("ignoring unsupported authorization {:?}", spec),
            Err(e) => debug!("ignoring authorization header: {}", e),
        }
    }
    Ok(Credentials::anonymous())
}
