//! # Core Domain Entities
//!
//! - [`FileNode`]: everything the engine knows about one file identity
//! - [`Query`]: one repair attempt, live or forwarding
//!
//! ```text
//!            live query                      proxy query (after merge)
//!  ┌──────────────────────────┐       ┌──────────────────────────────┐
//!  │ waiters: [c1, c2, ...]   │       │ waiters: []                  │
//!  │ active_queries: n        │ ◄──── │ active_queries: m            │
//!  │ proxy: None              │       │ proxy: Some(to @ generation) │
//!  │ generation: g            │       │ generation: g'               │
//!  └──────────────────────────┘       └──────────────────────────────┘
//! ```

use tokio::sync::oneshot;

use super::context_set::ContextSet;
use super::errors::{RepairResult, ResolverError};
use super::value_objects::{Destination, Generation, Timestamp};

/// Receives the outcome of one repair request.
pub type Completion = oneshot::Sender<RepairResult>;

/// One in-flight repair attempt of a node.
#[derive(Debug)]
pub struct Query {
    /// Requests waiting for this attempt.
    pub(crate) waiters: Vec<Completion>,
    /// Resolver calls whose result this query still expects, including calls
    /// forwarded by merged proxies.
    pub(crate) active_queries: u32,
    /// Set once the query only forwards results to another node.
    pub(crate) proxy: Option<Destination>,
    /// Stamp of this query; results for other stamps are ignored.
    pub(crate) generation: Generation,
    /// Failed lookups applied to this query so far.
    pub(crate) attempts: u32,
    /// Error of the most recent failed lookup.
    pub(crate) last_error: Option<ResolverError>,
}

impl Query {
    /// Fresh live query.
    pub fn new(generation: Generation) -> Self {
        Self {
            waiters: Vec::new(),
            active_queries: 0,
            proxy: None,
            generation,
            attempts: 0,
            last_error: None,
        }
    }

    /// Live queries own their waiters; proxies only forward.
    pub fn is_live(&self) -> bool {
        self.proxy.is_none()
    }

    /// Forwarding destination, if this is a proxy.
    pub fn proxy(&self) -> Option<Destination> {
        self.proxy
    }

    /// Generation stamp.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Outstanding resolver calls.
    pub fn active_queries(&self) -> u32 {
        self.active_queries
    }

    /// Number of waiting requests.
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// Resolve every waiter with `result`.
    pub(crate) fn resolve_all(&mut self, result: RepairResult) {
        for waiter in self.waiters.drain(..) {
            // A dropped receiver means the caller stopped waiting.
            let _ = waiter.send(result.clone());
        }
    }
}

/// Per-file record of the node table.
#[derive(Debug, Default)]
pub struct FileNode {
    /// Contexts that can currently justify a lookup for this file.
    pub(crate) contexts: ContextSet,
    /// Current repair attempt.
    pub(crate) query: Option<Query>,
    /// Generation of the last query created for this node.
    pub(crate) last_generation: Generation,
    /// When the last repair of this node succeeded.
    pub(crate) last_successful_repair: Option<Timestamp>,
}

impl FileNode {
    /// Usage contexts of this node.
    pub fn contexts(&self) -> &ContextSet {
        &self.contexts
    }

    /// Current query, live or proxy.
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Live query, if any.
    pub fn live_query(&self) -> Option<&Query> {
        self.query.as_ref().filter(|query| query.is_live())
    }

    /// Time of the last successful repair.
    pub fn last_successful_repair(&self) -> Option<Timestamp> {
        self.last_successful_repair
    }
}
