//! # Merge Operator
//!
//! Folds one file node into another once both identities turn out to denote
//! the same remote file.
//!
//! | `from` query | `to` query | Result |
//! |--------------|------------|--------|
//! | none / proxy | any | context sets unioned, queries untouched |
//! | live | none | `to` gets a new query (new generation) holding `from`'s waiters |
//! | live | live | `from`'s waiters join `to`'s query |
//!
//! Whenever `from` had a live query it becomes a proxy pointing at the
//! receiving query's generation, and that query takes over `from`'s count of
//! outstanding lookups. Results of those lookups are forwarded on arrival, or
//! discarded if the receiving query has been replaced in the meantime.
//!
//! If `to` itself forwards into a live query on another node, that node is
//! the receiver. Its context set absorbs `to`'s and `from`'s contexts so the
//! waiters it takes over can fall back on every context of the merged file.

use tracing::{debug, info};

use super::repair::{Dispatch, RepairCoordinator};
use crate::domain::{check_node_invariants, Destination, FileId, Timestamp};

impl RepairCoordinator {
    /// Merge `from`'s node into `to`'s.
    ///
    /// `to`'s contexts keep their order, `from`'s new contexts are appended
    /// and `from` is left without contexts. Callers must address the file as
    /// `to` from now on.
    pub fn merge(&mut self, to: FileId, from: FileId, now: Timestamp) -> Vec<Dispatch> {
        if to == from {
            return Vec::new();
        }
        let Some(from_node) = self.nodes.get(&from) else {
            debug!(to = %to, from = %from, "Nothing to merge");
            return Vec::new();
        };
        let from_live = from_node.live_query().is_some();
        let target = self.live_target(to);

        if target == Some(from) {
            // `to` already forwards into `from`'s live query; only the
            // contexts need to be shared.
            let from_contexts = from_node.contexts.clone();
            self.nodes
                .entry(to)
                .or_default()
                .contexts
                .merge(from_contexts, false);
            debug!(to = %to, from = %from, "Merged nodes already sharing a query");
            return Vec::new();
        }

        let Some(from_node) = self.nodes.get_mut(&from) else {
            return Vec::new();
        };
        let from_contexts = std::mem::take(&mut from_node.contexts);
        let moved = from_node
            .query
            .as_mut()
            .filter(|query| query.is_live())
            .map(|query| {
                (
                    std::mem::take(&mut query.waiters),
                    query.active_queries,
                    query.attempts,
                    query.last_error.take(),
                )
            });

        if let Some((waiters, active, attempts, last_error)) = moved {
            let target_id = target.unwrap_or(to);
            let query = match target {
                Some(_) => self.query_mut(target_id),
                None => Some(self.start_query(to)),
            };
            if let Some(query) = query {
                info!(
                    to = %to,
                    from = %from,
                    target = %target_id,
                    generation = query.generation,
                    moved_waiters = waiters.len(),
                    "Merged repair queries"
                );
                query.waiters.extend(waiters);
                query.active_queries += active;
                query.attempts += attempts;
                if query.last_error.is_none() {
                    query.last_error = last_error;
                }
                let proxy = Destination::new(target_id, query.generation);
                if let Some(from_query) = self.query_mut(from) {
                    from_query.proxy = Some(proxy);
                }
            }
        }

        // Receiver reached through `to`'s proxy chain.
        let forwarded_target = target.filter(|id| *id != to);
        if let Some(target_id) = forwarded_target {
            let to_contexts = self
                .nodes
                .get(&to)
                .map(|node| node.contexts.clone())
                .unwrap_or_default();
            if let Some(node) = self.nodes.get_mut(&target_id) {
                node.contexts.merge(to_contexts, false);
                node.contexts.merge(from_contexts.clone(), from_live);
                debug!(
                    to = %to,
                    from = %from,
                    target = %target_id,
                    contexts = node.contexts.len(),
                    "Shared merged contexts with forwarded query"
                );
            }
        }

        self.nodes
            .entry(to)
            .or_default()
            .contexts
            .merge(from_contexts, from_live);
        debug!(to = %to, from = %from, "Merged usage contexts");

        let mut dispatches = self.run_node(to, now);
        if let Some(target_id) = forwarded_target {
            dispatches.extend(self.run_node(target_id, now));
        }
        self.retire_idle_proxy(from);

        debug_assert!(self.nodes.get(&to).map_or(true, check_node_invariants));
        debug_assert!(self.nodes.get(&from).map_or(true, check_node_invariants));
        dispatches
    }
}
