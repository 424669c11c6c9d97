//! # Repair Query Coordinator
//!
//! Owns the node table and drives the repair protocol. The coordinator is a
//! plain state machine: it never talks to the resolver itself. Every
//! operation returns the [`Dispatch`]es the caller must perform, and resolver
//! outcomes are fed back through [`RepairCoordinator::on_query_result`].
//!
//! ## Protocol
//!
//! ```text
//! repair(f) ──► live query reachable? ──yes──► join its waiters
//!                    │ no
//!                    ▼
//!              contexts empty? ──yes──► NoSourceAvailable
//!                    │ no
//!                    ▼
//!              new query (generation g), dispatch newest untried context
//!
//! result(f@g) ──► query gone / other generation ──► dropped
//!                    │
//!                    ├─ proxy ──► forward to proxy destination (or stale)
//!                    ├─ Ok    ──► resolve all waiters, clear query
//!                    └─ Err   ──► nothing outstanding? dispatch next untried
//!                                 context, or AllSourcesExhausted
//! ```

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::RepairConfig;
use crate::domain::{
    check_node_invariants, invariant_destination_matches, invariant_generation_advances,
    Completion, Destination, FileId, FileNode, Generation, Query, RepairError, ResolverError,
    Timestamp, UsageContextId,
};

/// A resolver lookup the engine has to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dispatch {
    /// Where the result must be delivered.
    pub destination: Destination,
    /// Context to look up.
    pub context_id: UsageContextId,
}

/// What happened to a resolver result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultDelivery {
    /// Applied to the query that issued the lookup.
    Applied,
    /// Forwarded through merge proxies and applied to the query of `to`.
    Forwarded {
        /// Node whose query received the result.
        to: FileId,
    },
    /// A proxy on the way pointed at a query generation that is gone.
    StaleProxy,
    /// The issuing query no longer exists.
    Dropped,
}

/// File node table plus the repair protocol.
#[derive(Debug, Default)]
pub struct RepairCoordinator {
    pub(crate) nodes: HashMap<FileId, FileNode>,
    generation_counter: Generation,
    repair_cooldown_ms: u64,
}

impl RepairCoordinator {
    /// Create an empty coordinator.
    pub fn new(repair_cooldown_ms: u64) -> Self {
        Self {
            nodes: HashMap::new(),
            generation_counter: 0,
            repair_cooldown_ms,
        }
    }

    /// Create a coordinator from the engine configuration.
    pub fn from_config(config: &RepairConfig) -> Self {
        Self::new(config.repair_cooldown_ms)
    }

    /// Node record of `file_id`.
    pub fn node(&self, file_id: FileId) -> Option<&FileNode> {
        self.nodes.get(&file_id)
    }

    /// Number of known nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // Node table
    // =========================================================================

    /// Attach a usage context to a file. Returns false if already attached.
    pub fn add_usage_context(&mut self, file_id: FileId, context_id: UsageContextId) -> bool {
        let node = self.nodes.entry(file_id).or_default();
        let was_empty = node.contexts.is_empty();
        let added = node.contexts.add(context_id);
        if added && was_empty {
            debug!(file_id = %file_id, context_id = %context_id, "File became repairable");
        }
        added
    }

    /// Detach a usage context from a file. Returns false if not attached.
    ///
    /// A lookup already dispatched for this context is not affected.
    pub fn remove_usage_context(&mut self, file_id: FileId, context_id: UsageContextId) -> bool {
        let removed = self
            .nodes
            .get_mut(&file_id)
            .is_some_and(|node| node.contexts.remove(context_id));
        if removed {
            debug!(file_id = %file_id, context_id = %context_id, "Removed usage context");
        }
        removed
    }

    /// Usage contexts of a file in insertion order.
    pub fn usage_contexts(&self, file_id: FileId) -> Vec<UsageContextId> {
        self.nodes
            .get(&file_id)
            .map(|node| node.contexts.ids())
            .unwrap_or_default()
    }

    // =========================================================================
    // Repair protocol
    // =========================================================================

    /// Request a fresh reference for `file_id`; `completion` fires once.
    ///
    /// Requests for a file that already has a repair in flight (directly or
    /// through a merge proxy) join it and dispatch nothing.
    pub fn repair(
        &mut self,
        file_id: FileId,
        completion: Completion,
        now: Timestamp,
    ) -> Vec<Dispatch> {
        if let Some(target) = self.live_target(file_id) {
            if let Some(query) = self.query_mut(target) {
                debug!(
                    file_id = %file_id,
                    target = %target,
                    generation = query.generation,
                    waiters = query.waiters.len() + 1,
                    "Joining repair in flight"
                );
                query.waiters.push(completion);
                return Vec::new();
            }
        }

        let node = self.nodes.entry(file_id).or_default();
        if node.contexts.is_empty() {
            debug!(file_id = %file_id, "No usage context to repair from");
            let _ = completion.send(Err(RepairError::NoSourceAvailable(file_id)));
            return Vec::new();
        }
        if node.query.is_some() {
            debug!(file_id = %file_id, "Replacing stale proxy query");
        }

        let query = self.start_query(file_id);
        query.waiters.push(completion);
        debug!(file_id = %file_id, generation = query.generation, "Starting repair");

        self.run_node(file_id, now)
    }

    /// Apply the outcome of a lookup dispatched for `destination`.
    pub fn on_query_result(
        &mut self,
        destination: Destination,
        context_id: UsageContextId,
        result: Result<(), ResolverError>,
        now: Timestamp,
    ) -> (ResultDelivery, Vec<Dispatch>) {
        let mut dispatches = Vec::new();
        let delivery = self.deliver(destination, context_id, result, now, &mut dispatches);
        match delivery {
            ResultDelivery::StaleProxy => warn!(
                destination = %destination,
                context_id = %context_id,
                "Discarding result forwarded to a stale query"
            ),
            ResultDelivery::Dropped => debug!(
                destination = %destination,
                context_id = %context_id,
                "Discarding result of a finished query"
            ),
            _ => {}
        }
        debug_assert!(self
            .nodes
            .get(&destination.node_id)
            .map_or(true, check_node_invariants));
        (delivery, dispatches)
    }

    /// Walk the proxy chain from `dest` and apply the result at its end.
    ///
    /// Every hop gives back one outstanding lookup; proxies left idle by
    /// that are retired afterwards.
    fn deliver(
        &mut self,
        dest: Destination,
        context_id: UsageContextId,
        result: Result<(), ResolverError>,
        now: Timestamp,
        dispatches: &mut Vec<Dispatch>,
    ) -> ResultDelivery {
        let mut current = dest;
        let mut proxies = Vec::new();
        let mut applied = None;

        for _ in 0..=self.nodes.len() {
            let Some(query) = self.query_mut(current.node_id) else {
                break;
            };
            if query.generation != current.generation {
                break;
            }
            debug_assert!(query.active_queries > 0);
            query.active_queries = query.active_queries.saturating_sub(1);

            let Some(proxy) = query.proxy else {
                applied = Some(self.apply_local(current, context_id, result, now, dispatches));
                break;
            };
            proxies.push(current.node_id);
            current = proxy;
        }

        for node_id in &proxies {
            self.retire_idle_proxy(*node_id);
        }

        match applied {
            Some(ResultDelivery::Applied) if !proxies.is_empty() => ResultDelivery::Forwarded {
                to: current.node_id,
            },
            Some(delivery) => delivery,
            None if proxies.is_empty() => ResultDelivery::Dropped,
            None => ResultDelivery::StaleProxy,
        }
    }

    fn apply_local(
        &mut self,
        dest: Destination,
        context_id: UsageContextId,
        result: Result<(), ResolverError>,
        now: Timestamp,
        dispatches: &mut Vec<Dispatch>,
    ) -> ResultDelivery {
        let Some(node) = self.nodes.get_mut(&dest.node_id) else {
            return ResultDelivery::Dropped;
        };
        let Some(query) = node.query.as_mut() else {
            return ResultDelivery::Dropped;
        };

        match result {
            Ok(()) => {
                info!(
                    file_id = %dest.node_id,
                    context_id = %context_id,
                    waiters = query.waiters.len(),
                    "File reference repaired"
                );
                node.last_successful_repair = Some(now);
                query.resolve_all(Ok(()));
                node.query = None;
            }
            Err(error) => {
                debug!(
                    file_id = %dest.node_id,
                    context_id = %context_id,
                    error = %error,
                    outstanding = query.active_queries,
                    "Lookup failed"
                );
                query.attempts += 1;
                query.last_error = Some(error);
                dispatches.extend(self.run_node(dest.node_id, now));
            }
        }
        ResultDelivery::Applied
    }

    /// Dispatch the next lookup of a live query with nothing outstanding, or
    /// finish it when no context is left.
    pub(crate) fn run_node(&mut self, file_id: FileId, now: Timestamp) -> Vec<Dispatch> {
        let cooldown = self.repair_cooldown_ms;
        let Some(node) = self.nodes.get_mut(&file_id) else {
            return Vec::new();
        };
        let Some(query) = node.query.as_mut() else {
            return Vec::new();
        };
        if query.active_queries > 0 || !query.is_live() {
            return Vec::new();
        }

        if !node.contexts.has_next() {
            let error = if query.attempts == 0 {
                RepairError::NoSourceAvailable(file_id)
            } else {
                RepairError::AllSourcesExhausted {
                    file_id,
                    attempts: query.attempts,
                    last_error: query.last_error.clone(),
                }
            };
            warn!(
                file_id = %file_id,
                attempts = query.attempts,
                waiters = query.waiters.len(),
                "Failed to repair file reference"
            );
            query.resolve_all(Err(error));
            node.query = None;
            return Vec::new();
        }

        if let Some(last) = node.last_successful_repair {
            let ready_at = last.saturating_add(cooldown);
            if now < ready_at {
                debug!(file_id = %file_id, "File reference was repaired recently");
                query.resolve_all(Err(RepairError::RecentlyRepaired {
                    file_id,
                    retry_after_ms: ready_at - now,
                }));
                node.query = None;
                return Vec::new();
            }
        }

        let Some(context_id) = node.contexts.next() else {
            return Vec::new();
        };
        query.active_queries += 1;
        let destination = Destination::new(file_id, query.generation);
        debug!(destination = %destination, context_id = %context_id, "Dispatching lookup");
        vec![Dispatch {
            destination,
            context_id,
        }]
    }

    // =========================================================================
    // Helpers shared with the merge operator
    // =========================================================================

    /// Install a fresh live query on `file_id` and restart its context cursor.
    pub(crate) fn start_query(&mut self, file_id: FileId) -> &mut Query {
        self.generation_counter += 1;
        let generation = self.generation_counter;
        let node = self.nodes.entry(file_id).or_default();
        debug_assert!(invariant_generation_advances(
            node.last_generation,
            generation
        ));
        node.last_generation = generation;
        node.contexts.reset_position();
        node.query.insert(Query::new(generation))
    }

    /// Node holding the live query that `file_id`'s requests belong to.
    ///
    /// Follows proxies while their generations still match. `None` if the
    /// node has no query or the chain ends at a stale proxy.
    pub(crate) fn live_target(&self, file_id: FileId) -> Option<FileId> {
        let mut current = file_id;
        for _ in 0..=self.nodes.len() {
            let query = self.nodes.get(&current)?.query.as_ref()?;
            let Some(proxy) = query.proxy else {
                return Some(current);
            };
            let target = self.nodes.get(&proxy.node_id)?;
            if !invariant_destination_matches(proxy, target) {
                return None;
            }
            current = proxy.node_id;
        }
        None
    }

    pub(crate) fn query_mut(&mut self, file_id: FileId) -> Option<&mut Query> {
        self.nodes.get_mut(&file_id)?.query.as_mut()
    }

    /// Drop a proxy query once none of its lookups is outstanding.
    pub(crate) fn retire_idle_proxy(&mut self, file_id: FileId) {
        let Some(node) = self.nodes.get_mut(&file_id) else {
            return;
        };
        let idle = node
            .query
            .as_ref()
            .is_some_and(|query| !query.is_live() && query.active_queries == 0);
        if idle {
            debug!(file_id = %file_id, "Retiring proxy query");
            node.query = None;
        }
    }

    /// Fail every waiter of every live query; used when the engine stops.
    pub fn fail_all(&mut self, error: RepairError) -> usize {
        let mut failed = 0;
        for node in self.nodes.values_mut() {
            if let Some(mut query) = node.query.take() {
                failed += query.waiters.len();
                query.resolve_all(Err(error.clone()));
            }
        }
        failed
    }
}
