use std::error::Error;
use std::fmt;
use std::io;

/// Classification of a failed request. The HTTP status is the contract.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum RequestErrorType {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    Conflict,
    PreconditionFailed,
    UnsupportedMediaType,
    RangeNotSatisfiable,
    ReadError,
    WriteError,
    Internal,
}

impl RequestErrorType {
    pub fn status(&self) -> u16 {
        match self {
            RequestErrorType::BadRequest => 400,
            RequestErrorType::ReadError => 400,
            RequestErrorType::Unauthorized => 401,
            RequestErrorType::Forbidden => 403,
            RequestErrorType::NotFound => 404,
            RequestErrorType::MethodNotAllowed => 405,
            RequestErrorType::NotAcceptable => 406,
            RequestErrorType::Conflict => 409,
            RequestErrorType::PreconditionFailed => 412,
            RequestErrorType::UnsupportedMediaType => 415,
            RequestErrorType::RangeNotSatisfiable => 416,
            RequestErrorType::WriteError => 500,
            RequestErrorType::Internal => 500,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.status() {
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            409 => "Conflict",
            412 => "Precondition Failed",
            415 => "Unsupported Media Type",
            416 => "Range Not Satisfiable",
            _ => "Internal Server Error",
        }
    }
}

/// Error carried from any layer up to the dispatcher, which turns it into a response.
pub struct RequestError {
    pub typ: RequestErrorType,
    pub v: Option<String>,
}

impl RequestError {
    pub fn new(typ: RequestErrorType, v: &str) -> RequestError {
        RequestError {
            typ,
            v: Some(v.to_string()),
        }
    }

    pub fn bad_request(v: &str) -> RequestError {
        RequestError::new(RequestErrorType::BadRequest, v)
    }

    pub fn not_found(v: &str) -> RequestError {
        RequestError::new(RequestErrorType::NotFound, v)
    }

    pub fn conflict(v: &str) -> RequestError {
        RequestError::new(RequestErrorType::Conflict, v)
    }

    pub fn forbidden(v: &str) -> RequestError {
        RequestError::new(RequestErrorType::Forbidden, v)
    }

    pub fn internal(v: &str) -> RequestError {
        RequestError::new(RequestErrorType::Internal, v)
    }

    pub fn status(&self) -> u16 {
        self.typ.status()
    }

    /// Human-readable message, falling back to the status title.
    pub fn message(&self) -> String {
        match &self.v {
            Some(v) => v.clone(),
            None => self.typ.title().to_string(),
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} {}", self.status(), self.message())
    }
}

impl fmt::Debug for RequestError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{:?}: {}", self.typ, self.message())
    }
}

impl Error for RequestError {}

impl From<io::Error> for RequestError {
    fn from(e: io::Error) -> RequestError {
        RequestError::new(RequestErrorType::Internal, &e.to_string())
    }
}
