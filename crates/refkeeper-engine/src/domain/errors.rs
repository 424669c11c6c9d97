//! # Domain Errors
//!
//! Error types for the repair engine.
//!
//! Only [`RepairError`] ever reaches a repair caller. [`ResolverError`]s are
//! absorbed by the fallback chain and surface only as the `last_error` of an
//! exhausted repair.

use thiserror::Error;

use super::reference_error::RemoteError;
use super::value_objects::{FileId, UsageContextId};

/// Outcome delivered to a repair completion.
pub type RepairResult = Result<(), RepairError>;

/// Why a repair request failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepairError {
    /// The node has no usage context to try.
    #[error("No usage context available to repair {0}")]
    NoSourceAvailable(FileId),

    /// Every usage context of the node was tried and failed.
    #[error("All usage contexts exhausted for {file_id} after {attempts} attempts")]
    AllSourcesExhausted {
        /// Node that could not be repaired.
        file_id: FileId,
        /// Number of failed lookups applied to the query.
        attempts: u32,
        /// Error of the last failed lookup.
        last_error: Option<ResolverError>,
    },

    /// The node was repaired successfully a moment ago.
    #[error("{file_id} was repaired recently, retry after {retry_after_ms}ms")]
    RecentlyRepaired {
        /// Node.
        file_id: FileId,
        /// Remaining cooldown.
        retry_after_ms: u64,
    },

    /// The engine task is gone.
    #[error("Repair engine stopped")]
    EngineStopped,
}

impl RepairError {
    /// True for failures that retrying the same repair right away cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NoSourceAvailable(_) | Self::AllSourcesExhausted { .. }
        )
    }
}

/// Failure of a single resolver lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// The remote side rejected the lookup.
    #[error("Remote error: {0}")]
    Remote(RemoteError),

    /// The context can no longer be looked up (deleted message, left chat, ...).
    #[error("Usage context {0} is no longer available")]
    ContextUnavailable(UsageContextId),

    /// The lookup did not complete in time.
    #[error("Lookup timed out after {0}ms")]
    Timeout(u64),

    /// Anything else.
    #[error("Resolver failure: {0}")]
    Other(String),
}

impl ResolverError {
    /// Whether the lookup itself hit a stale file reference.
    pub fn is_reference_error(&self) -> bool {
        match self {
            Self::Remote(remote) => remote.is_reference_error(),
            _ => false,
        }
    }
}

impl From<RemoteError> for ResolverError {
    fn from(error: RemoteError) -> Self {
        Self::Remote(error)
    }
}

/// Errors of the usage-context persistence codec.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Snapshot does not start with the expected magic bytes.
    #[error("Invalid snapshot magic")]
    BadMagic,

    /// Snapshot written by an unknown format version.
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u8),

    /// Asked to encode an id the store never handed out.
    #[error("Unknown usage context: {0}")]
    UnknownContext(UsageContextId),

    /// Payload could not be (de)serialized.
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),
}
