//! HTML representations for browsers.
//!
//! Rendering is a callback passed to the dispatcher at construction, so an
//! embedding application can replace the built-in pages.

use std::fs;
use std::path::Path;

use crate::error::RequestError;
use crate::rdf::{
    Graph,
    Term,
};
use crate::target::Target;

pub trait View: Send + Sync {
    /// Page shown instead of raw RDF when a browser asks for `target`.
    fn data_browser(&self, target: &Target, graph: &Graph) -> Result<String, RequestError>;

    /// Page for a failed request.
    fn error_page(&self, error: &RequestError) -> String;
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n{}</body>\n</html>\n",
        escape_html(title),
        escape_html(title),
        body,
    )
}

fn cell(term: &Term) -> String {
    match term {
        Term::Iri(v) => format!("<a href=\"{}\">{}</a>", escape_html(v), escape_html(v)),
        t => escape_html(&t.to_string()),
    }
}

/// Built-in pages, optionally with an external data browser.
pub struct HtmlView {
    browser: Option<String>,
}

impl HtmlView {
    pub fn new() -> HtmlView {
        HtmlView {
            browser: None,
        }
    }

    /// Serve the HTML file at `path` as the data browser for every resource.
    pub fn with_browser(path: &Path) -> Result<HtmlView, RequestError> {
        let browser = fs::read_to_string(path)?;
        Ok(HtmlView {
            browser: Some(browser),
        })
    }
}

impl Default for HtmlView {
    fn default() -> HtmlView {
        HtmlView::new()
    }
}

impl View for HtmlView {
    fn data_browser(&self, target: &Target, graph: &Graph) -> Result<String, RequestError> {
        if let Some(b) = &self.browser {
            return Ok(b.clone());
        }
        let mut rows = String::new();
        for t in graph.iter() {
            rows.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                cell(&t.subject),
                cell(&t.predicate),
                cell(&t.object),
            ));
        }
        let body = format!(
            "<table>\n<tr><th>subject</th><th>predicate</th><th>object</th></tr>\n{}</table>\n",
            rows,
        );
        Ok(page(&target.location(), &body))
    }

    fn error_page(&self, error: &RequestError) -> String {
        let title = format!("{} {}", error.status(), error.typ.title());
        page(&title, &format!("<p>{}</p>\n", escape_html(&error.message())))
    }
}
