//! The immutable request value handed to the pipeline.
//!
//! A `Request` is parsed once from the wire and never mutated afterwards.
//! It deliberately carries no correlation state: two requests with identical
//! fields are still two different requests, and telling them apart is the
//! bridge's job, not this type's.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Version};

use super::ParseError;

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    version: Version,
    peer: SocketAddr,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, if one was present.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Address of the client this request arrived from.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Attaches the request body read after the header section.
    pub(crate) fn with_body(self, body: Bytes) -> Self {
        Self { body, ..self }
    }

    /// Builds a `Request` (with an empty body) out of a complete httparse
    /// header section.
    pub(crate) fn from_httparse(parsed: &httparse::Request<'_, '_>, peer: SocketAddr) -> Result<Self, ParseError> {
        let method = parsed
            .method
            .ok_or_else(|| ParseError::invalid_header("missing method"))?
            .parse::<Method>()
            .map_err(ParseError::invalid_header)?;

        let target = parsed.path.ok_or_else(|| ParseError::invalid_header("missing request target"))?;
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };

        let version = match parsed.version {
            Some(1) => Version::HTTP_11,
            Some(0) => Version::HTTP_10,
            other => return Err(ParseError::invalid_header(format!("unsupported http version {other:?}"))),
        };

        let mut headers = HeaderMap::with_capacity(parsed.headers.len());
        for header in parsed.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
            let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
            headers.append(name, value);
        }

        Ok(Self { method, path, query, version, peer, headers, body: Bytes::new() })
    }

    /// Declared body length, defaulting to zero when absent.
    pub(crate) fn content_length(&self) -> Result<usize, ParseError> {
        match self.headers.get(http::header::CONTENT_LENGTH) {
            None => Ok(0),
            Some(value) => value
                .to_str()
                .map_err(ParseError::invalid_content_length)?
                .parse::<usize>()
                .map_err(ParseError::invalid_content_length),
        }
    }
}
