//! The response value the pipeline produces.

use std::fmt;

use bytes::Bytes;
use futures::stream::BoxStream;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use sluice_bridge::error::BoxError;

/// A response body: nothing, buffered bytes, or a lazy byte stream whose
/// chunks are produced while the response is being written out.
pub enum ResponseBody {
    Empty,
    Full(Bytes),
    Streamed(BoxStream<'static, Result<Bytes, BoxError>>),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// Created exactly once per request, by the pipeline.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self { status, headers, body }
    }

    /// An empty response carrying only a status.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, HeaderMap::new(), ResponseBody::Empty)
    }

    /// A buffered plain-text response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        Self::new(status, headers, ResponseBody::Full(Bytes::from(body.into())))
    }

    /// A response whose body is produced lazily, written out chunk by chunk.
    pub fn streamed(status: StatusCode, body: BoxStream<'static, Result<Bytes, BoxError>>) -> Self {
        Self::new(status, HeaderMap::new(), ResponseBody::Streamed(body))
    }

    /// Adds a header, replacing any previous value for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderMap, ResponseBody) {
        (self.status, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_response_sets_a_content_type() {
        let response = Response::text(StatusCode::OK, "it works");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/plain; charset=utf-8"))
        );
        assert!(matches!(response.body(), ResponseBody::Full(bytes) if bytes.as_ref() == b"it works"));
    }

    #[test]
    fn with_header_replaces_existing_values() {
        let response = Response::empty(StatusCode::NO_CONTENT)
            .with_header(http::header::SERVER, HeaderValue::from_static("one"))
            .with_header(http::header::SERVER, HeaderValue::from_static("two"));
        assert_eq!(response.headers().get(http::header::SERVER), Some(&HeaderValue::from_static("two")));
    }
}
