//! One-request connection handling
//!
//! The connection layer is deliberately thin: it reads exactly one request
//! from the socket, hands it to the bridge, writes whatever comes back, and
//! closes. Everything interesting (correlation, the shared pipeline)
//! happens behind [`Bridge::call`](sluice_bridge::bridge::Bridge::call);
//! what lives here is the cosmetic wire formatting around it.

use std::net::SocketAddr;

use bytes::{Buf, Bytes, BytesMut};
use futures::StreamExt;
use http::{HeaderMap, StatusCode};
use httparse::Status;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error};

use sluice_bridge::error::CallError;

use crate::HttpBridge;
use crate::protocol::{ConnectionError, ParseError, Request, Response, ResponseBody, SendError};

const MAX_HEADER_BYTES: usize = 8 * 1024;
const MAX_HEADERS: usize = 64;
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, buffer: BytesMut::with_capacity(4 * 1024), peer }
    }

    /// Reads one request, serves it through the bridge, writes the response
    /// and closes the connection.
    pub async fn serve(mut self, bridge: &HttpBridge) -> Result<(), ConnectionError> {
        let request = match self.read_request().await {
            Ok(request) => request,
            Err(e) => {
                debug!(peer = %self.peer, cause = %e, "rejecting unreadable request");
                self.write_response(Response::text(StatusCode::BAD_REQUEST, format!("{e}\n"))).await?;
                if let Err(shutdown) = self.stream.shutdown().await {
                    debug!(cause = %shutdown, "shutdown connection error");
                }
                return Err(e.into());
            }
        };
        debug!(method = %request.method(), path = %request.path(), peer = %self.peer, "dispatching request into the bridge");

        let response = match bridge.call(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(cause = %e, "bridge did not produce a response");
                failure_response(&e)
            }
        };

        self.write_response(response).await?;

        if let Err(e) = self.stream.shutdown().await {
            debug!(cause = %e, "shutdown connection error");
        }
        Ok(())
    }

    async fn read_request(&mut self) -> Result<Request, ParseError> {
        let (head, body_offset) = loop {
            if let Some(found) = parse_head(&self.buffer, self.peer)? {
                break found;
            }
            if self.buffer.len() >= MAX_HEADER_BYTES {
                return Err(ParseError::too_large_header(self.buffer.len(), MAX_HEADER_BYTES));
            }
            if self.stream.read_buf(&mut self.buffer).await.map_err(ParseError::io)? == 0 {
                return Err(ParseError::UnexpectedEof);
            }
        };

        let content_length = head.content_length()?;
        if content_length > MAX_BODY_BYTES {
            return Err(ParseError::too_large_body(content_length, MAX_BODY_BYTES));
        }
        let body_end = body_offset
            .checked_add(content_length)
            .ok_or_else(|| ParseError::invalid_content_length("declared length overflows"))?;
        while self.buffer.len() < body_end {
            if self.stream.read_buf(&mut self.buffer).await.map_err(ParseError::io)? == 0 {
                return Err(ParseError::UnexpectedEof);
            }
        }

        self.buffer.advance(body_offset);
        let body = self.buffer.split_to(content_length).freeze();
        Ok(head.with_body(body))
    }

    async fn write_response(&mut self, response: Response) -> Result<(), SendError> {
        let (status, headers, body) = response.into_parts();

        let head = encode_head(status, &headers, &body);
        self.stream.write_all(&head).await.map_err(SendError::io)?;

        match body {
            ResponseBody::Empty => {}
            ResponseBody::Full(bytes) => {
                self.stream.write_all(&bytes).await.map_err(SendError::io)?;
            }
            ResponseBody::Streamed(mut chunks) => {
                while let Some(item) = chunks.next().await {
                    let chunk = item.map_err(|e| SendError::invalid_body(format!("resolve response body error: {e}")))?;
                    // an empty frame would read as end-of-body on the wire
                    if chunk.is_empty() {
                        continue;
                    }
                    self.stream.write_all(&encode_chunk(&chunk)).await.map_err(SendError::io)?;
                }
                self.stream.write_all(b"0\r\n\r\n").await.map_err(SendError::io)?;
            }
        }

        self.stream.flush().await.map_err(SendError::io)
    }
}

/// Tries to parse a complete header section out of `buffer`.
///
/// Returns the request (body still empty) and the offset where the body
/// starts, or `None` while the section is still incomplete.
fn parse_head(buffer: &[u8], peer: SocketAddr) -> Result<Option<(Request, usize)>, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);

    match parsed.parse(buffer) {
        Ok(Status::Complete(body_offset)) => Ok(Some((Request::from_httparse(&parsed, peer)?, body_offset))),
        Ok(Status::Partial) => Ok(None),
        Err(e) => Err(ParseError::invalid_header(e)),
    }
}

/// Status line and header block, with the framing headers the body variant
/// requires.
fn encode_head(status: StatusCode, headers: &HeaderMap, body: &ResponseBody) -> BytesMut {
    let mut out = BytesMut::with_capacity(256);

    let reason = status.canonical_reason().unwrap_or("Unknown");
    out.extend_from_slice(format!("HTTP/1.1 {} {reason}\r\n", status.as_u16()).as_bytes());

    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    match body {
        ResponseBody::Empty => {
            if !headers.contains_key(http::header::CONTENT_LENGTH) {
                out.extend_from_slice(b"content-length: 0\r\n");
            }
        }
        ResponseBody::Full(bytes) => {
            if !headers.contains_key(http::header::CONTENT_LENGTH) {
                out.extend_from_slice(format!("content-length: {}\r\n", bytes.len()).as_bytes());
            }
        }
        ResponseBody::Streamed(_) => {
            if !headers.contains_key(http::header::TRANSFER_ENCODING) {
                out.extend_from_slice(b"transfer-encoding: chunked\r\n");
            }
        }
    }

    out.extend_from_slice(b"connection: close\r\n\r\n");
    out
}

fn encode_chunk(chunk: &Bytes) -> BytesMut {
    let mut out = BytesMut::with_capacity(chunk.len() + 16);
    out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
    out.extend_from_slice(chunk);
    out.extend_from_slice(b"\r\n");
    out
}

fn failure_response(error: &CallError) -> Response {
    let status = match error {
        CallError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        CallError::PipelineTerminated(_) | CallError::Registry { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    Response::text(status, format!("{error}\n"))
}
