//! Bridges a synchronous one-request-in/one-response-out interface onto an
//! asynchronous stream pipeline.
//!
//! A server naturally hands each inbound connection's request to an isolated
//! task and wants a response back on that same task. A stream-oriented
//! processing core naturally wants the opposite shape: one continuous stream
//! of every request, so it can apply stream-level combinators (mapping,
//! filtering, batching, merging) across all of them. This crate is the
//! bridge between the two: requests submitted from any number of tasks are
//! tagged with a correlation token, injected into a single shared ingress
//! channel with exactly one subscriber, transformed by a user-supplied
//! pipeline invoked once over that channel, and each emitted response is
//! routed back to precisely the task still waiting for it.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use sluice_bridge::bridge::Bridge;
//! use sluice_bridge::ingress::RequestStream;
//! use sluice_bridge::pipeline::make_pipeline;
//!
//! #[tokio::main]
//! async fn main() {
//!     // The pipeline sees one stream carrying every caller's request and
//!     // may reorder, batch, or merge freely; correlation is by token.
//!     let pipeline = make_pipeline(|requests: RequestStream<String>| {
//!         requests.map(|envelope| {
//!             let length = envelope.request().len();
//!             Ok((envelope, length))
//!         })
//!     });
//!
//!     let bridge = Bridge::new(pipeline).expect("fresh ingress channel");
//!
//!     let response = bridge.call(String::from("hello")).await.expect("pipeline echoes");
//!     assert_eq!(response, 5);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`token`]: correlation tokens and the [`token::Envelope`] tagging each
//!   request at ingress
//! - [`registry`]: the pending set, one slot and one-shot wake signal per
//!   in-flight request
//! - [`ingress`]: the single multicast entry point into the pipeline, with
//!   its exactly-one-subscriber invariant
//! - [`pipeline`]: the contract a user pipeline satisfies, invoked once over
//!   the whole request stream
//! - [`bridge`]: the facade callers use, one [`bridge::Bridge::call`] per
//!   inbound request
//!
//! # Failure behavior
//!
//! A caller never hangs on a dead pipeline. If the pipeline's output stream
//! completes or fails while callers are waiting, every pending slot and
//! every future call resolves with
//! [`error::CallError::PipelineTerminated`]; a response emitted for a
//! request that is no longer pending (timed out, cancelled) is logged and
//! dropped without affecting anyone else.

pub mod bridge;
pub mod error;
pub mod ingress;
pub mod pipeline;
pub mod registry;
pub mod token;

mod dispatcher;
