//! # File Reference Service
//!
//! Runs the [`RepairCoordinator`] as a single-writer task.
//!
//! ## Architecture
//!
//! ```text
//!  FileReferenceHandle ──Command──►┐
//!  FileReferenceHandle ──Command──►├──► FileReferenceService (one task)
//!                                  │         │  owns RepairCoordinator
//!  resolver task ──LookupResult───►┘         │
//!        ▲                                   │ Dispatch
//!        └───────── tokio::spawn ◄───────────┘
//! ```
//!
//! Every mutation of the node table happens inside the service task, in the
//! order commands and lookup results arrive. Resolver lookups run in their own
//! tasks; the service never waits on them, it just picks up their results
//! from the second channel.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::algorithms::{Dispatch, RepairCoordinator, ResultDelivery};
use crate::config::RepairConfig;
use crate::domain::{
    Completion, Destination, FileId, MessageFullId, RepairError, RepairResult, ResolverError,
    UsageContextId, UsageContextStore,
};
use crate::ports::{FileReferenceApi, SourceResolver, SystemTimeSource, TimeSource};

/// Requests from handles to the service task.
enum Command {
    AddUsageContext {
        file_id: FileId,
        context_id: UsageContextId,
        reply: oneshot::Sender<bool>,
    },
    RemoveUsageContext {
        file_id: FileId,
        context_id: UsageContextId,
        reply: oneshot::Sender<bool>,
    },
    GetUsageContexts {
        file_id: FileId,
        reply: oneshot::Sender<Vec<UsageContextId>>,
    },
    Repair {
        file_id: FileId,
        completion: Completion,
    },
    Merge {
        to: FileId,
        from: FileId,
        reply: oneshot::Sender<()>,
    },
}

/// Outcome of one resolver lookup.
struct LookupResult {
    destination: Destination,
    context_id: UsageContextId,
    result: Result<(), ResolverError>,
}

/// Counters shared by the service and its handles.
#[derive(Debug, Default)]
pub struct RepairStats {
    /// Repair requests received.
    pub repairs_requested: AtomicU64,
    /// Resolver lookups started.
    pub lookups_dispatched: AtomicU64,
    /// Resolver lookups that succeeded.
    pub lookups_succeeded: AtomicU64,
    /// Resolver lookups that failed or timed out.
    pub lookups_failed: AtomicU64,
    /// Results discarded at a stale merge proxy.
    pub stale_results: AtomicU64,
    /// Merges applied.
    pub merges: AtomicU64,
}

/// Point-in-time copy of [`RepairStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairStatsSnapshot {
    /// Repair requests received.
    pub repairs_requested: u64,
    /// Resolver lookups started.
    pub lookups_dispatched: u64,
    /// Resolver lookups that succeeded.
    pub lookups_succeeded: u64,
    /// Resolver lookups that failed or timed out.
    pub lookups_failed: u64,
    /// Results discarded at a stale merge proxy.
    pub stale_results: u64,
    /// Merges applied.
    pub merges: u64,
}

impl RepairStats {
    /// Read all counters.
    pub fn snapshot(&self) -> RepairStatsSnapshot {
        RepairStatsSnapshot {
            repairs_requested: self.repairs_requested.load(Ordering::Relaxed),
            lookups_dispatched: self.lookups_dispatched.load(Ordering::Relaxed),
            lookups_succeeded: self.lookups_succeeded.load(Ordering::Relaxed),
            lookups_failed: self.lookups_failed.load(Ordering::Relaxed),
            stale_results: self.stale_results.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
        }
    }
}

/// Pending outcome of a repair request.
///
/// The request is already queued when the ticket is handed out; dropping the
/// ticket only discards the outcome.
#[derive(Debug)]
pub struct RepairTicket {
    response: oneshot::Receiver<RepairResult>,
}

impl RepairTicket {
    fn new(response: oneshot::Receiver<RepairResult>) -> Self {
        Self { response }
    }

    /// Outcome, if the repair has finished already.
    pub fn try_outcome(&mut self) -> Option<RepairResult> {
        match self.response.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(RepairError::EngineStopped)),
        }
    }
}

impl Future for RepairTicket {
    type Output = RepairResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.response)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RepairError::EngineStopped)))
    }
}

/// Repair engine task.
pub struct FileReferenceService<R: SourceResolver, T: TimeSource = SystemTimeSource> {
    config: RepairConfig,
    coordinator: RepairCoordinator,
    store: Arc<UsageContextStore>,
    resolver: Arc<R>,
    clock: Arc<T>,
    stats: Arc<RepairStats>,
    commands: mpsc::UnboundedReceiver<Command>,
    results_tx: mpsc::UnboundedSender<LookupResult>,
    results_rx: mpsc::UnboundedReceiver<LookupResult>,
}

impl<R: SourceResolver, T: TimeSource> FileReferenceService<R, T> {
    /// Create the service and the first handle to it.
    ///
    /// The service does nothing until [`run`](Self::run) is polled.
    pub fn new(
        config: RepairConfig,
        store: Arc<UsageContextStore>,
        resolver: Arc<R>,
        clock: Arc<T>,
    ) -> (Self, FileReferenceHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(RepairStats::default());

        let handle = FileReferenceHandle {
            commands: commands_tx,
            store: store.clone(),
            stats: stats.clone(),
        };
        let service = Self {
            coordinator: RepairCoordinator::from_config(&config),
            config,
            store,
            resolver,
            clock,
            stats,
            commands,
            results_tx,
            results_rx,
        };
        (service, handle)
    }

    /// Start the service on the current tokio runtime.
    pub fn spawn(
        config: RepairConfig,
        store: Arc<UsageContextStore>,
        resolver: Arc<R>,
        clock: Arc<T>,
    ) -> FileReferenceHandle {
        let (service, handle) = Self::new(config, store, resolver, clock);
        tokio::spawn(service.run());
        handle
    }

    /// Process commands and lookup results until every handle is dropped.
    ///
    /// Repairs still pending at that point fail with
    /// [`RepairError::EngineStopped`].
    pub async fn run(mut self) {
        info!(
            cooldown_ms = self.config.repair_cooldown_ms,
            lookup_timeout_ms = self.config.lookup_timeout_ms,
            "File reference service started"
        );
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(result) = self.results_rx.recv() => self.handle_result(result),
            }
        }
        let failed = self.coordinator.fail_all(RepairError::EngineStopped);
        info!(
            failed_waiters = failed,
            nodes = self.coordinator.node_count(),
            "File reference service stopped"
        );
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::AddUsageContext {
                file_id,
                context_id,
                reply,
            } => {
                let added = self.coordinator.add_usage_context(file_id, context_id);
                let _ = reply.send(added);
            }
            Command::RemoveUsageContext {
                file_id,
                context_id,
                reply,
            } => {
                let removed = self.coordinator.remove_usage_context(file_id, context_id);
                let _ = reply.send(removed);
            }
            Command::GetUsageContexts { file_id, reply } => {
                let _ = reply.send(self.coordinator.usage_contexts(file_id));
            }
            Command::Repair {
                file_id,
                completion,
            } => {
                self.stats.repairs_requested.fetch_add(1, Ordering::Relaxed);
                let now = self.clock.now();
                let dispatches = self.coordinator.repair(file_id, completion, now);
                self.dispatch(dispatches);
            }
            Command::Merge { to, from, reply } => {
                self.stats.merges.fetch_add(1, Ordering::Relaxed);
                let now = self.clock.now();
                let dispatches = self.coordinator.merge(to, from, now);
                self.dispatch(dispatches);
                let _ = reply.send(());
            }
        }
    }

    fn handle_result(&mut self, lookup: LookupResult) {
        let counter = if lookup.result.is_ok() {
            &self.stats.lookups_succeeded
        } else {
            &self.stats.lookups_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let now = self.clock.now();
        let (delivery, dispatches) = self.coordinator.on_query_result(
            lookup.destination,
            lookup.context_id,
            lookup.result,
            now,
        );
        if delivery == ResultDelivery::StaleProxy {
            self.stats.stale_results.fetch_add(1, Ordering::Relaxed);
        }
        self.dispatch(dispatches);
    }

    fn dispatch(&self, dispatches: Vec<Dispatch>) {
        for Dispatch {
            destination,
            context_id,
        } in dispatches
        {
            self.stats.lookups_dispatched.fetch_add(1, Ordering::Relaxed);
            let results = self.results_tx.clone();

            let Some(context) = self.store.get(context_id) else {
                warn!(context_id = %context_id, "Usage context missing from store");
                let _ = results.send(LookupResult {
                    destination,
                    context_id,
                    result: Err(ResolverError::ContextUnavailable(context_id)),
                });
                continue;
            };

            debug!(
                destination = %destination,
                context_id = %context_id,
                kind = ?context.kind(),
                context = %context,
                "Starting lookup"
            );
            let resolver = self.resolver.clone();
            let timeout_ms = self.config.lookup_timeout_ms;
            tokio::spawn(async move {
                let lookup = resolver.resolve(destination.node_id, context_id, &context);
                let result = tokio::time::timeout(Duration::from_millis(timeout_ms), lookup)
                    .await
                    .unwrap_or(Err(ResolverError::Timeout(timeout_ms)));
                let _ = results.send(LookupResult {
                    destination,
                    context_id,
                    result,
                });
            });
        }
    }
}

/// Cloneable handle to a running [`FileReferenceService`].
#[derive(Clone)]
pub struct FileReferenceHandle {
    commands: mpsc::UnboundedSender<Command>,
    store: Arc<UsageContextStore>,
    stats: Arc<RepairStats>,
}

impl FileReferenceHandle {
    /// Usage-context store shared with the service.
    pub fn store(&self) -> &Arc<UsageContextStore> {
        &self.store
    }

    /// Current counters.
    pub fn stats(&self) -> RepairStatsSnapshot {
        self.stats.snapshot()
    }

    /// False once the service task has exited.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn request<V>(
        &self,
        command: impl FnOnce(oneshot::Sender<V>) -> Command,
    ) -> Result<V, RepairError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| RepairError::EngineStopped)?;
        response.await.map_err(|_| RepairError::EngineStopped)
    }
}

#[async_trait]
impl FileReferenceApi for FileReferenceHandle {
    async fn add_usage_context(
        &self,
        file_id: FileId,
        context_id: UsageContextId,
    ) -> Result<bool, RepairError> {
        self.request(|reply| Command::AddUsageContext {
            file_id,
            context_id,
            reply,
        })
        .await
    }

    async fn remove_usage_context(
        &self,
        file_id: FileId,
        context_id: UsageContextId,
    ) -> Result<bool, RepairError> {
        self.request(|reply| Command::RemoveUsageContext {
            file_id,
            context_id,
            reply,
        })
        .await
    }

    async fn get_some_usage_contexts(
        &self,
        file_id: FileId,
    ) -> Result<Vec<UsageContextId>, RepairError> {
        self.request(|reply| Command::GetUsageContexts { file_id, reply })
            .await
    }

    async fn get_some_message_contexts(
        &self,
        file_id: FileId,
    ) -> Result<Vec<MessageFullId>, RepairError> {
        let ids = self.get_some_usage_contexts(file_id).await?;
        Ok(ids
            .into_iter()
            .filter_map(|id| self.store.get(id).and_then(|context| context.message()))
            .collect())
    }

    fn repair(&self, file_id: FileId) -> RepairTicket {
        let (completion, response) = oneshot::channel();
        // If the service is gone the command, and with it the completion, is
        // dropped and the ticket reports `EngineStopped`.
        let _ = self.commands.send(Command::Repair {
            file_id,
            completion,
        });
        RepairTicket::new(response)
    }

    async fn merge(&self, to: FileId, from: FileId) -> Result<(), RepairError> {
        self.request(|reply| Command::Merge { to, from, reply })
            .await
    }
}
