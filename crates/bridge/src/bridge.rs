//! The bridge facade: the one externally callable entry point.
//!
//! [`Bridge::call`] looks synchronous from the caller's side: one request in,
//! one response out. Internally each call registers a correlation slot,
//! injects the tagged request into the shared ingress channel, suspends its
//! own task until the dispatcher releases it, and returns the stored
//! response. Many tasks call concurrently; each blocks only itself. The
//! user pipeline runs on a dedicated drive task spawned at construction and
//! is treated as an opaque box that eventually emits pairs.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info};

use crate::dispatcher::Dispatcher;
use crate::error::{BoxError, CallError, IngressError, TerminationReason};
use crate::ingress::Ingress;
use crate::pipeline::Pipeline;
use crate::registry::Registry;
use crate::token::{Envelope, Token, TokenMinter};

/// State observed by every caller: set once, when the pipeline stops.
#[derive(Debug, Default)]
struct Shared {
    terminated: OnceLock<TerminationReason>,
}

pub struct Bridge<Req, Resp> {
    ingress: Ingress<Req>,
    registry: Arc<Registry<Resp>>,
    minter: TokenMinter,
    shared: Arc<Shared>,
    timeout: Option<Duration>,
    driver: JoinHandle<()>,
}

impl<Req, Resp> fmt::Debug for Bridge<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("pending", &self.registry.pending())
            .field("terminated", &self.shared.terminated.get())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct BridgeBuilder {
    timeout: Option<Duration>,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a maximum wait per call. The default is no timeout.
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Builds the bridge: subscribes the pipeline to the ingress channel
    /// (exactly once, for the bridge's whole lifetime) and spawns the drive
    /// task that routes its output. Must run inside a tokio runtime.
    pub fn build<Req, P>(self, pipeline: P) -> Result<Bridge<Req, P::Resp>, IngressError>
    where
        Req: Send + 'static,
        P: Pipeline<Req>,
    {
        let ingress = Ingress::new();
        let requests = ingress.subscribe()?;

        let registry = Arc::new(Registry::new());
        let shared = Arc::new(Shared::default());

        let output = pipeline.build(requests);
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        let driver = tokio::spawn(drive(output, dispatcher, Arc::clone(&registry), Arc::clone(&shared)));

        Ok(Bridge { ingress, registry, minter: TokenMinter::default(), shared, timeout: self.timeout, driver })
    }
}

impl<Req, Resp> Bridge<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Builds a bridge with default settings, see [`BridgeBuilder::build`].
    pub fn new<P>(pipeline: P) -> Result<Self, IngressError>
    where
        P: Pipeline<Req, Resp = Resp>,
    {
        BridgeBuilder::new().build(pipeline)
    }

    /// Submits one request and waits for the response the pipeline produces
    /// for it.
    ///
    /// Concurrent calls proceed independently: each suspends only its own
    /// task, and a slow response for one request never blocks another from
    /// being submitted or resolved. Responses may be released in a different
    /// order than requests were submitted.
    ///
    /// Fails with [`CallError::PipelineTerminated`] once the pipeline has
    /// stopped emitting, and with [`CallError::Timeout`] if a configured
    /// maximum wait elapses. Dropping the returned future mid-wait
    /// unregisters the slot; a late response for it is logged and dropped.
    pub async fn call(&self, request: Req) -> Result<Resp, CallError> {
        self.call_inner(request, self.timeout).await
    }

    /// Like [`call`](Self::call), with a per-call maximum wait overriding the
    /// builder-level setting.
    pub async fn call_with_timeout(&self, request: Req, limit: Duration) -> Result<Resp, CallError> {
        self.call_inner(request, Some(limit)).await
    }

    async fn call_inner(&self, request: Req, limit: Option<Duration>) -> Result<Resp, CallError> {
        if let Some(reason) = self.shared.terminated.get() {
            return Err(CallError::PipelineTerminated(reason.clone()));
        }

        let token = self.minter.next();
        let handle = self.registry.register(token)?;

        // removes the slot when the caller stops waiting for any reason;
        // a no-op if the slot was already consumed by a resolve
        let _guard = PendingGuard { registry: &self.registry, token };

        if self.ingress.submit(Envelope::new(token, request)).is_err() {
            return Err(CallError::PipelineTerminated(self.termination_reason()));
        }

        match limit {
            None => handle.wait().await,
            Some(limit) => match time::timeout(limit, handle.wait()).await {
                Ok(outcome) => outcome,
                Err(_elapsed) => Err(CallError::Timeout { limit }),
            },
        }
    }

    /// Number of calls currently awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.registry.pending()
    }

    /// Why the pipeline stopped, if it has.
    pub fn termination(&self) -> Option<TerminationReason> {
        self.shared.terminated.get().cloned()
    }

    /// Tears the bridge down: closes the ingress channel so the request
    /// stream ends, then waits for the drive task to drain the pipeline's
    /// remaining output. Callers still pending afterwards are released with
    /// [`CallError::PipelineTerminated`].
    pub async fn shutdown(self) {
        let _ = self.shared.terminated.set(TerminationReason::ShutDown);
        self.ingress.close();
        if let Err(e) = self.driver.await {
            error!(cause = %e, "drive task ended abnormally");
        }
    }

    fn termination_reason(&self) -> TerminationReason {
        // submit can only fail after the receiver side is gone; if the drive
        // task has not recorded a reason yet, the pipeline dropped the
        // request stream while still running
        self.shared
            .terminated
            .get()
            .cloned()
            .unwrap_or_else(|| TerminationReason::failed("request stream dropped by pipeline"))
    }
}

/// Drives the pipeline's output stream until it terminates.
///
/// Termination before teardown is fatal for every pending caller: the reason
/// is recorded first (so future calls fail fast), then the output stream is
/// dropped (so in-flight submissions fail rather than queue forever), and
/// only then are the pending slots drained. That ordering leaves no window
/// in which a registered caller could hang.
async fn drive<Req, Resp, S>(output: S, dispatcher: Dispatcher<Resp>, registry: Arc<Registry<Resp>>, shared: Arc<Shared>)
where
    S: Stream<Item = Result<(Envelope<Req>, Resp), BoxError>> + Send,
{
    let mut output = Box::pin(output);

    let reason = loop {
        match output.next().await {
            Some(Ok((envelope, response))) => {
                dispatcher.on_item(envelope.token(), response);
            }
            Some(Err(cause)) => break dispatcher.on_error(&cause),
            None => break TerminationReason::Completed,
        }
    };

    let reason = shared.terminated.get_or_init(|| reason).clone();
    drop(output);

    info!(reason = %reason, pending = registry.pending(), "pipeline stopped emitting, releasing pending callers");
    registry.fail_all(&reason);
}

struct PendingGuard<'registry, Resp> {
    registry: &'registry Registry<Resp>,
    token: Token,
}

impl<Resp> Drop for PendingGuard<'_, Resp> {
    fn drop(&mut self) {
        if self.registry.unregister(self.token) {
            debug!(token = %self.token, "unregistered slot for abandoned call");
        }
    }
}
