//! Splitting of `multipart/form-data` request bodies.

use std::str::FromStr;

use log::debug;
use mime::Mime;

use crate::error::RequestError;

/// One file field of a form upload.
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub name: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

pub fn is_multipart(content_type: Option<&str>) -> bool {
    match content_type.map(Mime::from_str) {
        Some(Ok(m)) => m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA,
        _ => false,
    }
}

/// The boundary parameter of a multipart content type.
pub fn boundary(content_type: &str) -> Result<String, RequestError> {
    let m = match Mime::from_str(content_type) {
        Ok(v) => v,
        Err(e) => {
            return Err(RequestError::bad_request(&format!("invalid content type {}: {}", content_type, e)));
        },
    };
    match m.get_param(mime::BOUNDARY) {
        Some(b) if !b.as_str().is_empty() => Ok(b.as_str().to_string()),
        _ => Err(RequestError::bad_request("multipart body without boundary")),
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

/// Value of `key` in a header like `form-data; name="file"; filename="a.ttl"`.
fn disposition_param(header: &str, key: &str) -> Option<String> {
    for p in header.split(';').skip(1) {
        let mut kv = p.splitn(2, '=');
        let k = kv.next().unwrap_or("").trim();
        if k.eq_ignore_ascii_case(key) {
            let v = kv.next().unwrap_or("").trim().trim_matches('"');
            return Some(v.to_string());
        }
    }
    None
}

fn part(raw: &[u8]) -> Result<Part, RequestError> {
    let split = match find(raw, b"\r\n\r\n", 0) {
        Some(v) => v,
        None => return Err(RequestError::bad_request("multipart part without header block")),
    };
    let head = String::from_utf8_lossy(&raw[..split]);
    let mut p = Part {
        name: None,
        filename: None,
        content_type: None,
        data: raw[split + 4..].to_vec(),
    };
    for line in head.split("\r\n") {
        let mut kv = line.splitn(2, ':');
        let k = kv.next().unwrap_or("").trim();
        let v = kv.next().unwrap_or("").trim();
        if k.eq_ignore_ascii_case("content-disposition") {
            p.name = disposition_param(v, "name");
            p.filename = disposition_param(v, "filename").filter(|f| !f.is_empty());
        } else if k.eq_ignore_ascii_case("content-type") && !v.is_empty() {
            p.content_type = Some(v.to_string());
        }
    }
    Ok(p)
}

/// Split `body` on `boundary`. Parts without a filename are form fields and are skipped.
pub fn parse(body: &[u8], boundary: &str) -> Result<Vec<Part>, RequestError> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();
    let mut pos = match find(body, delimiter, 0) {
        Some(v) => v + delimiter.len(),
        None => return Err(RequestError::bad_request("multipart boundary not found")),
    };
    let mut parts = vec!();
    loop {
        if body[pos..].starts_with(b"--") {
            break;
        }
        let start = match find(body, b"\r\n", pos) {
            Some(v) if v == pos => v + 2,
            _ => return Err(RequestError::bad_request("malformed multipart delimiter")),
        };
        let mut closing = b"\r\n".to_vec();
        closing.extend_from_slice(delimiter);
        let end = match find(body, &closing, start) {
            Some(v) => v,
            None => return Err(RequestError::bad_request("unterminated multipart body")),
        };
        let p = part(&body[start..end])?;
        if p.filename.is_some() {
            parts.push(p);
        } else {
            debug!("skipping form field {:?}", p.name);
        }
        pos = end + closing.len();
    }
    Ok(parts)
}
