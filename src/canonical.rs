//! Canonicalization for pre-signed URL signatures.
//!
//! The canonical string for a request is
//!
//! ```text
//! METHOD \n origin \n query-without-signature \n expiration-millis
//! ```
//!
//! where `origin` is `scheme://authority/path` and the query is the raw query string, byte for byte,
//! with only the signature parameter removed. Parameters are neither decoded, sorted, nor
//! re-encoded, so any change to the transmitted query string changes the canonical string.

use {
    crate::constants::{DEFAULT_SCHEME, EXPIRATION, HMAC_SIGNATURE},
    http::{header::HOST, request::Parts, Method, Request, Uri},
    log::trace,
};

/// The parts of an inbound request that participate in signature verification.
///
/// This is built once per request and never modified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedRequestView {
    /// The HTTP method of the request.
    method: Method,

    /// `scheme://authority/path` of the request; the query string is excluded.
    origin: String,

    /// The query string exactly as transmitted, including the signature and expiration parameters.
    raw_query: String,
}

impl SignedRequestView {
    /// Create a view from its components.
    pub fn new(method: Method, origin: impl Into<String>, raw_query: impl Into<String>) -> Self {
        Self {
            method,
            origin: origin.into(),
            raw_query: raw_query.into(),
        }
    }

    /// Create a view from a method and a full URL, e.g. one returned by [`sign`][crate::sign].
    ///
    /// If the URL is not absolute, the origin is rebuilt using `http` and an empty authority.
    pub fn from_uri(method: Method, uri: &Uri) -> Self {
        Self::new(method, uri_origin(uri, None, DEFAULT_SCHEME), uri.query().unwrap_or(""))
    }

    /// Create a view from HTTP request [`Parts`].
    ///
    /// When the request target is in origin form (`/path?query`), the authority is taken from the
    /// `Host` header and the scheme is `default_scheme`.
    pub fn from_parts(parts: &Parts, default_scheme: &str) -> Self {
        let host = parts.headers.get(HOST).and_then(|h| h.to_str().ok());
        let origin = uri_origin(&parts.uri, host, default_scheme);
        Self::new(parts.method.clone(), origin, parts.uri.query().unwrap_or(""))
    }

    /// Create a view from an HTTP [`Request`]. See [`from_parts`][Self::from_parts].
    pub fn from_request<B>(request: &Request<B>, default_scheme: &str) -> Self {
        let host = request.headers().get(HOST).and_then(|h| h.to_str().ok());
        let origin = uri_origin(request.uri(), host, default_scheme);
        Self::new(request.method().clone(), origin, request.uri().query().unwrap_or(""))
    }

    /// The HTTP method of the request.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// `scheme://authority/path` of the request.
    #[inline]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The raw query string of the request.
    #[inline]
    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }
}

/// Rebuild `scheme://host[:port]/path` for a URI.
///
/// Userinfo is dropped: clients never send it, so a server only ever sees `Host: host[:port]`.
pub(crate) fn uri_origin(uri: &Uri, host: Option<&str>, default_scheme: &str) -> String {
    let scheme = uri.scheme_str().unwrap_or(default_scheme);
    match uri.authority() {
        Some(authority) => match authority.port() {
            Some(port) => format!("{}://{}:{}{}", scheme, authority.host(), port.as_str(), uri.path()),
            None => format!("{}://{}{}", scheme, authority.host(), uri.path()),
        },
        None => format!("{}://{}{}", scheme, host.unwrap_or(""), uri.path()),
    }
}

/// The signature-relevant pieces of a raw query string.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct QueryComponents<'a> {
    /// The query string with the signature parameter removed; everything else is untouched.
    pub(crate) unsigned_query: String,

    /// Raw values of every `expiration` parameter, in order.
    pub(crate) expirations: Vec<&'a str>,

    /// Raw values of every `hmacSignature` parameter, in order.
    pub(crate) signatures: Vec<&'a str>,
}

impl<'a> QueryComponents<'a> {
    /// The expiration value, if exactly one was supplied.
    pub(crate) fn expiration(&self) -> Option<&'a str> {
        single(&self.expirations)
    }

    /// The signature value, if exactly one was supplied.
    pub(crate) fn signature(&self) -> Option<&'a str> {
        single(&self.signatures)
    }
}

fn single<'a>(values: &[&'a str]) -> Option<&'a str> {
    match values {
        [value] => Some(*value),
        _ => None,
    }
}

/// Split a `name=value` query segment. A segment without `=` is all name.
#[inline]
pub(crate) fn split_param(segment: &str) -> (&str, &str) {
    segment.split_once('=').unwrap_or((segment, ""))
}

/// Split a raw query string into its signature-relevant components.
pub(crate) fn split_query(raw_query: &str) -> QueryComponents<'_> {
    let mut result = QueryComponents::default();
    let mut kept: Vec<&str> = Vec::new();

    for segment in raw_query.split('&') {
        let (name, value) = split_param(segment);
        if name == HMAC_SIGNATURE {
            result.signatures.push(value);
            continue;
        }

        if name == EXPIRATION {
            result.expirations.push(value);
        }

        kept.push(segment);
    }

    result.unsigned_query = kept.join("&");
    result
}

/// Build the string that is fed into HMAC-SHA256.
pub(crate) fn canonical_string(method: &Method, origin: &str, unsigned_query: &str, expiration_millis: i64) -> String {
    let result = format!("{}\n{}\n{}\n{}", method.as_str(), origin, unsigned_query, expiration_millis);
    trace!("Canonical string: {:?}", result);
    result
}
