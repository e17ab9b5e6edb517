use std::str::FromStr;

use mime::Mime;

/// One entry of an `Accept` header.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaRange {
    pub typ: String,
    pub subtype: String,
    pub q: f32,
}

impl MediaRange {
    /// 2 for an exact match, 1 for `type/*`, 0 for `*/*`, None if not matching.
    fn specificity(&self, typ: &str, subtype: &str) -> Option<u8> {
        if self.typ == "*" && self.subtype == "*" {
            return Some(0);
        }
        if self.typ != typ {
            return None;
        }
        if self.subtype == "*" {
            return Some(1);
        }
        if self.subtype == subtype {
            return Some(2);
        }
        None
    }
}

/// Negotiation context of a request.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Accept {
    pub ranges: Vec<MediaRange>,
    pub charsets: Vec<(String, f32)>,
}

fn parse_q(s: Option<&str>) -> f32 {
    match s {
        Some(v) => match f32::from_str(v.trim()) {
            Ok(q) if q >= 0.0 && q <= 1.0 => q,
            _ => 0.0,
        },
        None => 1.0,
    }
}

impl Accept {
    pub fn parse(accept: Option<&str>, accept_charset: Option<&str>) -> Accept {
        let mut ranges = vec!();
        if let Some(header) = accept {
            for part in header.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let m = match Mime::from_str(part) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                let q = parse_q(m.get_param("q").map(|v| v.as_str()));
                ranges.push(MediaRange {
                    typ: m.type_().as_str().to_ascii_lowercase(),
                    subtype: m.subtype().as_str().to_ascii_lowercase(),
                    q,
                });
            }
        }

        let mut charsets = vec!();
        if let Some(header) = accept_charset {
            for part in header.split(',') {
                let mut it = part.split(';');
                let name = match it.next() {
                    Some(v) if !v.trim().is_empty() => v.trim().to_ascii_lowercase(),
                    _ => continue,
                };
                let q = match it.next() {
                    Some(p) => parse_q(p.trim().strip_prefix("q=")),
                    None => 1.0,
                };
                charsets.push((name, q));
            }
        }
        Accept {
            ranges,
            charsets,
        }
    }

    /// Whether the client stated any media preference at all.
    pub fn is_explicit(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Quality the client assigns to `content_type`, by its most specific matching range.
    pub fn quality(&self, content_type: &str) -> f32 {
        if self.ranges.is_empty() {
            return 1.0;
        }
        let essence = crate::rdf::essence(content_type);
        let mut parts = essence.splitn(2, '/');
        let typ = parts.next().unwrap_or("");
        let subtype = parts.next().unwrap_or("");
        let mut best: Option<(u8, f32)> = None;
        for r in self.ranges.iter() {
            if let Some(s) = r.specificity(typ, subtype) {
                match best {
                    Some((bs, _)) if bs >= s => {},
                    _ => best = Some((s, r.q)),
                }
            }
        }
        match best {
            Some((_, q)) => q,
            None => 0.0,
        }
    }

    /// Whether `content_type` is named explicitly rather than through a wildcard.
    pub fn names(&self, content_type: &str) -> bool {
        let essence = crate::rdf::essence(content_type);
        self.ranges.iter().any(|r| format!("{}/{}", r.typ, r.subtype) == essence && r.q > 0.0)
    }

    /// Best of `available`; ties go to the earlier entry.
    pub fn preferred(&self, available: &[&str]) -> Option<String> {
        let mut best: Option<(&str, f32)> = None;
        for &a in available.iter() {
            let q = self.quality(a);
            if q <= 0.0 {
                continue;
            }
            match best {
                Some((_, bq)) if bq >= q => {},
                _ => best = Some((a, q)),
            }
        }
        best.map(|(a, _)| a.to_string())
    }

    pub fn charset_ok(&self, charset: &str) -> bool {
        if self.charsets.is_empty() {
            return true;
        }
        let charset = charset.to_ascii_lowercase();
        let mut wildcard: Option<f32> = None;
        for (name, q) in self.charsets.iter() {
            if *name == charset {
                return *q > 0.0;
            }
            if name == "*" {
                wildcard = Some(*q);
            }
        }
        match wildcard {
            Some(q) => q > 0.0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Accept;

    const BROWSER: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

    #[test]
    fn test_browser_prefers_html() {
        let a = Accept::parse(Some(BROWSER), None);
        let best = a.preferred(&["text/turtle", "application/ld+json", "text/html"]);
        assert_eq!(best.as_deref(), Some("text/html"));
        assert!(a.names("text/html"));
        assert!(!a.names("text/turtle"));
    }

    #[test]
    fn test_wildcard_keeps_stored_order() {
        let a = Accept::parse(Some("*/*"), None);
        let best = a.preferred(&["text/turtle", "text/html"]);
        assert_eq!(best.as_deref(), Some("text/turtle"));
    }

    #[test]
    fn test_specific_beats_wildcard() {
        let a = Accept::parse(Some("text/*;q=0.5, text/turtle;q=0, */*"), None);
        assert_eq!(a.quality("text/turtle"), 0.0);
        assert_eq!(a.quality("text/plain"), 0.5);
        assert_eq!(a.quality("image/png"), 1.0);
    }

    #[test]
    fn test_no_header_accepts_everything() {
        let a = Accept::parse(None, None);
        assert!(!a.is_explicit());
        assert_eq!(a.quality("application/octet-stream"), 1.0);
        assert!(a.charset_ok("utf-8"));
    }

    #[test]
    fn test_charset() {
        let a = Accept::parse(None, Some("iso-8859-1, utf-8;q=0"));
        assert!(!a.charset_ok("UTF-8"));
        let a = Accept::parse(None, Some("iso-8859-1, *;q=0.1"));
        assert!(a.charset_ok("utf-8"));
    }
}
