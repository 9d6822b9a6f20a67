//! The contract a user pipeline must satisfy.
//!
//! A pipeline is a transformation from the stream of all tagged requests to a
//! stream of (envelope, response) pairs. It is invoked exactly once, at
//! bridge construction, over the whole request stream; this is what lets it
//! apply genuine stream operators (windowing, batching, merging across
//! requests) instead of being re-invoked per call. Pairs may come out in any
//! order; correlation is by token only.
//!
//! An `Err` item in the output is a pipeline-level failure, not a
//! per-request one: the bridge treats it as fatal and broadcasts the failure
//! to every pending caller. Per-request failures should instead be encoded
//! in the response type the pipeline emits.

use futures::Stream;

use crate::error::BoxError;
use crate::ingress::RequestStream;
use crate::token::Envelope;

pub trait Pipeline<Req>: Send {
    type Resp: Send + 'static;
    type Stream: Stream<Item = Result<(Envelope<Req>, Self::Resp), BoxError>> + Send + 'static;

    fn build(self, requests: RequestStream<Req>) -> Self::Stream;
}

#[derive(Debug)]
pub struct PipelineFn<F> {
    f: F,
}

impl<Req, Resp, S, F> Pipeline<Req> for PipelineFn<F>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    S: Stream<Item = Result<(Envelope<Req>, Resp), BoxError>> + Send + 'static,
    F: FnOnce(RequestStream<Req>) -> S + Send,
{
    type Resp = Resp;
    type Stream = S;

    fn build(self, requests: RequestStream<Req>) -> Self::Stream {
        (self.f)(requests)
    }
}

pub fn make_pipeline<F, Req, Resp, S>(f: F) -> PipelineFn<F>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    S: Stream<Item = Result<(Envelope<Req>, Resp), BoxError>> + Send + 'static,
    F: FnOnce(RequestStream<Req>) -> S + Send,
{
    PipelineFn { f }
}
