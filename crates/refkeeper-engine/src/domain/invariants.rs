//! # Domain Invariants
//!
//! Rules the node table must uphold after every operation. The coordinator
//! checks them with `debug_assert!`; tests call them directly.

use super::entities::{FileNode, Query};
use super::value_objects::{Destination, Generation};

/// Invariant: a node's query generations strictly increase.
pub fn invariant_generation_advances(previous: Generation, next: Generation) -> bool {
    next > previous
}

/// Invariant: a live query always owns at least one waiter.
///
/// Waiters leave a live query only when it is resolved (and cleared) or when
/// it is turned into a proxy.
pub fn invariant_live_query_has_waiters(query: &Query) -> bool {
    !query.is_live() || !query.waiters.is_empty()
}

/// Invariant: proxies never hold waiters.
pub fn invariant_proxy_has_no_waiters(query: &Query) -> bool {
    query.is_live() || query.waiters.is_empty()
}

/// Invariant: a destination only matches the query it was captured from.
pub fn invariant_destination_matches(dest: Destination, target: &FileNode) -> bool {
    target
        .query
        .as_ref()
        .is_some_and(|query| query.generation == dest.generation)
}

/// All per-node invariants.
pub fn check_node_invariants(node: &FileNode) -> bool {
    match &node.query {
        None => true,
        Some(query) => {
            invariant_live_query_has_waiters(query)
                && invariant_proxy_has_no_waiters(query)
                && query.generation <= node.last_generation
        }
    }
}
