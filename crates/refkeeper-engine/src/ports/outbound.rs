//! # Outbound Ports
//!
//! Dependencies of the repair engine on the outside world:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`SourceResolver`] | Re-fetch a usage context so the file layer sees a fresh reference |
//! | [`TimeSource`] | Clock for the repair cooldown |
//!
//! Test doubles live in `test_utils` (feature `test-utils`).

use async_trait::async_trait;

use crate::domain::{FileId, ResolverError, Timestamp, UsageContext, UsageContextId};

/// Performs the domain-specific lookup behind a usage context.
///
/// A successful lookup means the fresh reference has already been handed to
/// the file layer; the engine only learns that it worked. The engine calls
/// `resolve` at most once per context and repair attempt.
#[async_trait]
pub trait SourceResolver: Send + Sync + 'static {
    /// Look `context` up again on behalf of `file_id`.
    async fn resolve(
        &self,
        file_id: FileId,
        context_id: UsageContextId,
        context: &UsageContext,
    ) -> Result<(), ResolverError>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync + 'static {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}
