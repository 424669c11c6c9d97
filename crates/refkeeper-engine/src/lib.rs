//! # RefKeeper Repair Engine
//!
//! Keeps remote file references usable after they expire.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! A remote file reference is an opaque token that stops working after a
//! while. The engine remembers every place a file was seen (its *usage
//! contexts*) and, when the file layer reports a stale reference, re-fetches
//! those places one by one until one of them yields a fresh reference.
//!
//! - Concurrent repairs of one file share a single lookup chain.
//! - A failed lookup falls back to the next untried context.
//! - Files discovered to be identical are merged, including repairs already in
//!   flight on either side.
//!
//! ## Repair Lifecycle
//!
//! ```text
//! repair() ──► [no query] ──start──► [live query] ──success──► all waiters Ok
//!                                        │    ▲
//!                                 failure│    │next untried context
//!                                        ▼    │
//!                                  [contexts left?] ──no──► all waiters Err
//!
//! merge(to, from) with a live query on `from`:
//!     from's waiters ──► query on `to` ; from becomes a proxy that forwards
//!     late lookup results to `to` for as long as `to`'s query generation holds
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement Location |
//! |-----------|---------------------|
//! | At most one live query per file | `algorithms/repair.rs` - `repair()` joins |
//! | Every waiter resolved exactly once | `domain/entities.rs` - `Query::resolve_all()` |
//! | Context ids dense and immutable | `domain/context_store.rs` - append-only |
//! | Stale results never reach a newer query | `algorithms/repair.rs` - generation check |
//! | Total order per file | `application/service.rs` - single-writer task |
//!
//! ## Module Structure
//!
//! ```text
//! refkeeper-engine/
//! ├── domain/          # Ids, usage contexts, context store, node/query records, errors
//! ├── algorithms/      # Repair protocol and node merging (pure state machine)
//! ├── ports/           # FileReferenceApi (inbound), SourceResolver + TimeSource (outbound)
//! ├── application/     # FileReferenceService task and FileReferenceHandle
//! ├── adapters/        # Usage-context persistence codec
//! ├── test_utils.rs    # Port doubles (feature `test-utils`)
//! └── config.rs        # RepairConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

/// Test doubles (MockSourceResolver, ControlledSourceResolver, MockTimeSource)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::{decode_context, encode_context, restore_store, save_store};
pub use algorithms::{Dispatch, RepairCoordinator, ResultDelivery};
pub use application::{
    FileReferenceHandle, FileReferenceService, RepairStats, RepairStatsSnapshot, RepairTicket,
};
pub use config::RepairConfig;
pub use domain::{
    error_position, is_reference_error, BackgroundId, ChannelId, ChatId, ContextSet, Destination,
    DialogId, FileId, FileNode, Generation, MessageFullId, MessageId, PersistenceError, Query,
    RemoteError, RepairError, RepairResult, ResolverError, Timestamp, UsageContext,
    UsageContextId, UsageContextKind, UsageContextStore, UserId,
};
pub use ports::{FileReferenceApi, SourceResolver, SystemTimeSource, TimeSource};

// =============================================================================
// TEST UTILITIES (Requires `test-utils` feature)
// =============================================================================

#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::{
    ControlledSourceResolver, MockSourceResolver, MockTimeSource, PendingLookup,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
