//! # Test Utilities
//!
//! Doubles for the outbound ports, for this crate's tests and for the
//! workspace test suite. Enable with the `test-utils` feature flag.
//!
//! | Double | Replaces | Behaviour |
//! |--------|----------|-----------|
//! | [`MockTimeSource`] | `SystemTimeSource` | clock moved by hand |
//! | [`MockSourceResolver`] | `SourceResolver` | answers from a fixed script |
//! | [`ControlledSourceResolver`] | `SourceResolver` | parks lookups until answered |

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

use crate::domain::{FileId, ResolverError, Timestamp, UsageContext, UsageContextId};
use crate::ports::{SourceResolver, TimeSource};

/// Manually driven clock.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    time: AtomicU64,
}

impl MockTimeSource {
    /// Clock starting at `initial`.
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    /// Set the clock.
    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}

/// Resolver answering from a fixed script.
///
/// Contexts without a scripted outcome fail with
/// [`ResolverError::ContextUnavailable`].
#[derive(Debug, Default)]
pub struct MockSourceResolver {
    outcomes: Mutex<HashMap<UsageContextId, Result<(), ResolverError>>>,
    calls: Mutex<Vec<(FileId, UsageContextId)>>,
}

impl MockSourceResolver {
    /// Resolver with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookups of `context_id` succeed.
    pub fn succeed_on(self, context_id: UsageContextId) -> Self {
        self.outcomes.lock().insert(context_id, Ok(()));
        self
    }

    /// Lookups of `context_id` fail with `error`.
    pub fn fail_on(self, context_id: UsageContextId, error: ResolverError) -> Self {
        self.outcomes.lock().insert(context_id, Err(error));
        self
    }

    /// Every lookup performed so far, in order.
    pub fn calls(&self) -> Vec<(FileId, UsageContextId)> {
        self.calls.lock().clone()
    }

    /// Number of lookups performed so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SourceResolver for MockSourceResolver {
    async fn resolve(
        &self,
        file_id: FileId,
        context_id: UsageContextId,
        _context: &UsageContext,
    ) -> Result<(), ResolverError> {
        self.calls.lock().push((file_id, context_id));
        self.outcomes
            .lock()
            .get(&context_id)
            .cloned()
            .unwrap_or(Err(ResolverError::ContextUnavailable(context_id)))
    }
}

/// A lookup parked inside [`ControlledSourceResolver`].
#[derive(Debug)]
pub struct PendingLookup {
    /// File being repaired.
    pub file_id: FileId,
    /// Context being looked up.
    pub context_id: UsageContextId,
    /// Context value.
    pub context: UsageContext,
    responder: oneshot::Sender<Result<(), ResolverError>>,
}

impl PendingLookup {
    /// Finish the lookup with `result`.
    pub fn respond(self, result: Result<(), ResolverError>) {
        let _ = self.responder.send(result);
    }
}

/// Resolver whose lookups complete only when the test says so.
///
/// Every call shows up on the receiver returned by [`ControlledSourceResolver::new`]
/// and blocks until answered with [`PendingLookup::respond`].
#[derive(Debug)]
pub struct ControlledSourceResolver {
    lookups: mpsc::UnboundedSender<PendingLookup>,
}

impl ControlledSourceResolver {
    /// Resolver plus the stream of its pending lookups.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingLookup>) {
        let (lookups, rx) = mpsc::unbounded_channel();
        (Self { lookups }, rx)
    }
}

#[async_trait]
impl SourceResolver for ControlledSourceResolver {
    async fn resolve(
        &self,
        file_id: FileId,
        context_id: UsageContextId,
        context: &UsageContext,
    ) -> Result<(), ResolverError> {
        let (responder, response) = oneshot::channel();
        let lookup = PendingLookup {
            file_id,
            context_id,
            context: context.clone(),
            responder,
        };
        if self.lookups.send(lookup).is_err() {
            return Err(ResolverError::Other("lookup receiver closed".to_string()));
        }
        response
            .await
            .unwrap_or_else(|_| Err(ResolverError::Other("lookup abandoned".to_string())))
    }
}
