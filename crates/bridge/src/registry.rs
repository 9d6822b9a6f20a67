//! The correlation registry: one slot per in-flight request.
//!
//! A slot is created when a request is submitted and destroyed when its
//! response is handed to the waiting caller (or when the caller gives up).
//! Each slot pairs the request's token with a single-use wake channel, so the
//! producer side (the dispatcher) and the waiter side (the facade) rendezvous
//! without ever holding a lock across the wait itself. The registry mutex
//! guards single fast map operations only.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::channel::oneshot;
use tracing::debug;

use crate::error::{CallError, RegistryError, TerminationReason};
use crate::token::Token;

/// What a waiter eventually receives: the response the pipeline produced for
/// its request, or the terminal error the bridge broadcast.
pub(crate) type Outcome<Resp> = Result<Resp, CallError>;

pub struct Registry<Resp> {
    pending: Mutex<HashMap<Token, oneshot::Sender<Outcome<Resp>>>>,
}

impl<Resp> Default for Registry<Resp> {
    fn default() -> Self {
        Self { pending: Mutex::new(HashMap::new()) }
    }
}

impl<Resp> fmt::Debug for Registry<Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("pending", &self.lock().len()).finish()
    }
}

impl<Resp> Registry<Resp> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Token, oneshot::Sender<Outcome<Resp>>>> {
        // a poisoned map is still structurally sound, keep serving
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a slot for `token` and returns the handle its caller will
    /// block on. At most one slot per token may exist at a time.
    pub fn register(&self, token: Token) -> Result<WaitHandle<Resp>, RegistryError> {
        let (sender, receiver) = oneshot::channel();

        let mut pending = self.lock();
        if pending.contains_key(&token) {
            return Err(RegistryError::DuplicateToken { token });
        }
        pending.insert(token, sender);

        Ok(WaitHandle { receiver })
    }

    /// Stores the outcome for `token` and releases its waiter exactly once.
    ///
    /// The slot is removed before the wake signal fires, so a second resolve
    /// for the same token observes `UnknownToken` instead of silently
    /// overwriting the first response.
    pub fn resolve(&self, token: Token, outcome: Outcome<Resp>) -> Result<(), RegistryError> {
        let sender = self.lock().remove(&token).ok_or(RegistryError::UnknownToken { token })?;

        if sender.send(outcome).is_err() {
            // the caller stopped waiting between lookup and send
            debug!(token = %token, "waiter went away before release");
        }
        Ok(())
    }

    /// Removes the slot for `token` without releasing anything.
    ///
    /// Used by callers that stop waiting (timeout or cancellation) so the
    /// pending set does not leak. Returns whether a slot was still present.
    pub fn unregister(&self, token: Token) -> bool {
        self.lock().remove(&token).is_some()
    }

    /// Drains every pending slot, releasing each waiter with the given
    /// terminal reason. Called when the pipeline stops emitting.
    pub fn fail_all(&self, reason: &TerminationReason) {
        let drained = {
            let mut pending = self.lock();
            pending.drain().collect::<Vec<_>>()
        };

        for (token, sender) in drained {
            if sender.send(Err(CallError::PipelineTerminated(reason.clone()))).is_err() {
                debug!(token = %token, "waiter went away before pipeline teardown reached it");
            }
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }
}

/// The waiter side of one correlation slot.
///
/// Awaiting [`wait`](Self::wait) is the only place the bridge suspends; it
/// consumes the handle and leaves no trace of the slot afterward.
pub struct WaitHandle<Resp> {
    receiver: oneshot::Receiver<Outcome<Resp>>,
}

impl<Resp> fmt::Debug for WaitHandle<Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitHandle").finish_non_exhaustive()
    }
}

impl<Resp> WaitHandle<Resp> {
    pub async fn wait(self) -> Outcome<Resp> {
        match self.receiver.await {
            Ok(outcome) => outcome,
            // the registry was dropped with the slot still in it
            Err(_canceled) => Err(CallError::PipelineTerminated(TerminationReason::ShutDown)),
        }
    }
}
