//! A minimal http shell around the sluice stream bridge
//!
//! This crate is the peripheral half of the workspace: it accepts TCP
//! connections, parses one request per connection into an immutable
//! [`protocol::Request`], pushes it through a
//! [`sluice_bridge::bridge::Bridge`], and writes the
//! [`protocol::Response`] the pipeline produced back to the socket. The
//! whole correlation story lives in `sluice-bridge`; what remains here is
//! wire cosmetics (status lines, header formatting, chunked body framing)
//! and the accept loop.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use http::StatusCode;
//! use sluice_bridge::bridge::Bridge;
//! use sluice_bridge::ingress::RequestStream;
//! use sluice_bridge::pipeline::make_pipeline;
//! use sluice_web::protocol::{Request, Response};
//! use sluice_web::server::Server;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = make_pipeline(|requests: RequestStream<Request>| {
//!         requests.map(|envelope| {
//!             let response = Response::text(StatusCode::OK, format!("you asked for {}\n", envelope.request().path()));
//!             Ok((envelope, response))
//!         })
//!     });
//!     let bridge = Bridge::new(pipeline).expect("fresh ingress channel");
//!
//!     let server = Server::builder()
//!         .address("127.0.0.1:8000")
//!         .expect("resolvable address")
//!         .build()
//!         .expect("address was set");
//!     server.serve(bridge).await;
//! }
//! ```

pub mod connection;
pub mod protocol;
pub mod server;

use protocol::{Request, Response};
use sluice_bridge::bridge::Bridge;

/// The bridge type this shell serves: http requests in, http responses out.
pub type HttpBridge = Bridge<Request, Response>;
