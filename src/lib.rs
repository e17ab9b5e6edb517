#![crate_name = "podd"]

//! podd is a Linked Data Platform server for personal data stores.
//!
//! Every resource is addressed by URL and stored as a file below the
//! storage root. Containers are directories, and a request to a container
//! returns its listing as RDF.
//!
//! ## Content types
//!
//! The content type of a resource is implied by the extension of its file.
//! When the URL does not carry a fitting extension the file gets a
//! synthetic one after a `$`, so `PUT /profile` with `text/turtle` lands in
//! `profile$.ttl`. See [mapper](crate::mapper).
//!
//! RDF resources in Turtle, N3, N-Triples and JSON-LD can be read in any of
//! those serializations, and changed in place with `PATCH` bodies in SPARQL
//! Update or N3 Patch form. See [patch](crate::patch).
//!
//! ## Access control
//!
//! Each request is checked against the nearest `.acl` resource, following
//! Web Access Control. The requesting agent is identified by a WebID set
//! by an authenticating proxy, see [auth](crate::auth).
//!
//! ## Running the daemon
//!
//! The daemon listens to all ip addresses on port 8000 by default, and
//! serves the current directory. See `cargo run -- --help` for options.
//! With `--owner` the given WebID is granted control of the root container
//! on first start.

/// Server settings from the command line.
pub mod arg;

/// Classification of failed requests.
pub mod error;

/// The addressed resource of a request.
pub mod target;

/// `Accept` header parsing and content negotiation.
pub mod accept;

pub mod mapper;

pub mod store;

pub mod rdf;

pub mod patch;

pub mod auth;

pub mod multipart;

pub mod view;

pub mod handler;

/// Encapsulates an incoming remote request.
pub mod request;

/// Encapsulates an outgoing response to remote.
pub mod response;
