//! Routes pipeline emissions back to their pending callers.

use std::sync::Arc;

use tracing::{error, warn};

use crate::error::{BoxError, RegistryError, TerminationReason};
use crate::registry::Registry;
use crate::token::Token;

/// Consumes the pipeline's output on behalf of the drive task.
///
/// Matching uses the correlation token exclusively, so value-equal but
/// distinct requests are never conflated and a response is only ever handed
/// to the caller whose request produced it.
#[derive(Debug)]
pub(crate) struct Dispatcher<Resp> {
    registry: Arc<Registry<Resp>>,
}

impl<Resp> Dispatcher<Resp> {
    pub(crate) fn new(registry: Arc<Registry<Resp>>) -> Self {
        Self { registry }
    }

    /// Handles one emitted pair: stores the response and releases the waiter.
    ///
    /// An unknown token means the pipeline emitted for a request that is no
    /// longer pending (its caller timed out or was cancelled, or the
    /// pipeline duplicated an emission). That is logged and dropped; it must
    /// never crash the drive task or reach an unrelated caller.
    pub(crate) fn on_item(&self, token: Token, response: Resp) {
        match self.registry.resolve(token, Ok(response)) {
            Ok(()) => {}
            Err(RegistryError::UnknownToken { token }) => {
                warn!(token = %token, "dropping response with no pending slot");
            }
            Err(e @ RegistryError::DuplicateToken { .. }) => {
                // resolve never reports duplicates, but don't crash if it did
                error!(cause = %e, "unexpected registry failure while resolving");
            }
        }
    }

    /// Handles a pipeline-level error.
    ///
    /// Policy: an error on the pipeline's control channel is global. It is
    /// reported here and turned into the termination reason the drive task
    /// broadcasts to every pending caller, so nobody is left hanging.
    pub(crate) fn on_error(&self, cause: &BoxError) -> TerminationReason {
        error!(cause = %cause, pending = self.registry.pending(), "pipeline output stream failed");
        TerminationReason::failed(cause)
    }
}
