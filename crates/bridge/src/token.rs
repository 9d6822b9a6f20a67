//! Correlation identity for in-flight requests.
//!
//! Every request entering the bridge is tagged with a [`Token`] minted from a
//! process-local monotonic counter. Correlation between a pipeline emission
//! and the caller waiting for it uses the token exclusively; the request
//! value itself plays no part in matching. Two structurally identical
//! requests therefore stay distinguishable for their whole lifetime in the
//! system.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque correlation token assigned to exactly one in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mints monotonically increasing tokens.
///
/// A bridge owns one minter, so a token is never reused for the lifetime of
/// that bridge and duplicate registration cannot occur in correct usage.
#[derive(Debug, Default)]
pub(crate) struct TokenMinter {
    next: AtomicU64,
}

impl TokenMinter {
    pub(crate) fn next(&self) -> Token {
        Token(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// A request tagged with its correlation token.
///
/// The pipeline receives envelopes from the request stream and must hand the
/// envelope (or at least its token) back alongside the response it computes,
/// so the dispatcher can release the right waiter. The wrapped request is
/// immutable: the envelope only ever lends it out or gives it away whole.
#[derive(Debug, Clone)]
pub struct Envelope<Req> {
    token: Token,
    request: Req,
}

impl<Req> Envelope<Req> {
    pub(crate) fn new(token: Token, request: Req) -> Self {
        Self { token, request }
    }

    /// The correlation token assigned at ingress.
    pub fn token(&self) -> Token {
        self.token
    }

    /// Borrows the wrapped request.
    pub fn request(&self) -> &Req {
        &self.request
    }

    /// Consumes the envelope, returning the token and the request.
    pub fn into_parts(self) -> (Token, Req) {
        (self.token, self.request)
    }
}
