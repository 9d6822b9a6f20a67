//! The request ingress channel: the single entry point into the pipeline.
//!
//! Every inbound request is injected here, so pipeline-level stream operators
//! (mapping, filtering, batching) observe one unified sequence across all
//! callers. The channel is a multicast subject with exactly one subscriber:
//! [`subscribe`](Ingress::subscribe) hands out the sole [`RequestStream`]
//! once, and any later attempt fails. Submission never drops a request; the
//! channel buffers while the subscriber is busy. Ordering is FIFO per
//! submitter, with no guarantee across submitters beyond an interleaving
//! consistent with real-time submission.

use std::fmt;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use futures::channel::mpsc;
use futures::stream::StreamExt;

use crate::error::IngressError;
use crate::token::Envelope;

pub struct Ingress<Req> {
    sender: mpsc::UnboundedSender<Envelope<Req>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Envelope<Req>>>>,
}

impl<Req> fmt::Debug for Ingress<Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingress").field("closed", &self.sender.is_closed()).finish_non_exhaustive()
    }
}

impl<Req> Default for Ingress<Req> {
    fn default() -> Self {
        let (sender, receiver) = mpsc::unbounded();
        Self { sender, receiver: Mutex::new(Some(receiver)) }
    }
}

impl<Req> Ingress<Req> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues an envelope for the subscriber.
    ///
    /// Fails with [`IngressError::Closed`] once the subscriber side is gone,
    /// which only happens when the pipeline has terminated or the bridge is
    /// tearing down.
    pub fn submit(&self, envelope: Envelope<Req>) -> Result<(), IngressError> {
        self.sender.unbounded_send(envelope).map_err(|_| IngressError::Closed)
    }

    /// Takes the one and only subscription to the channel.
    ///
    /// The single-subscriber invariant is enforced here rather than left as
    /// a usage convention: a second call fails with
    /// [`IngressError::AlreadySubscribed`].
    pub fn subscribe(&self) -> Result<RequestStream<Req>, IngressError> {
        let mut slot = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let receiver = slot.take().ok_or(IngressError::AlreadySubscribed)?;
        Ok(RequestStream { receiver })
    }

    /// Closes the channel: the subscriber's stream ends after draining what
    /// was already submitted, and further submissions fail.
    pub fn close(&self) {
        self.sender.close_channel();
    }
}

/// The stream of tagged requests handed to the user pipeline, exactly once.
pub struct RequestStream<Req> {
    receiver: mpsc::UnboundedReceiver<Envelope<Req>>,
}

impl<Req> fmt::Debug for RequestStream<Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestStream").finish_non_exhaustive()
    }
}

impl<Req> Stream for RequestStream<Req> {
    type Item = Envelope<Req>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_next_unpin(cx)
    }
}
