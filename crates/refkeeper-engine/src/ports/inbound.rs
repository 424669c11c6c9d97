//! # Inbound Ports
//!
//! API the file-management layer uses to drive the repair engine.

use async_trait::async_trait;

use crate::application::RepairTicket;
use crate::domain::{FileId, MessageFullId, RepairError, UsageContextId};

/// File reference API - inbound port.
///
/// Usage contexts themselves are registered through the shared
/// [`UsageContextStore`](crate::domain::UsageContextStore); this trait covers
/// the operations serialized by the engine.
#[async_trait]
pub trait FileReferenceApi: Send + Sync {
    /// Attach a usage context to a file. `Ok(false)` if already attached.
    async fn add_usage_context(
        &self,
        file_id: FileId,
        context_id: UsageContextId,
    ) -> Result<bool, RepairError>;

    /// Detach a usage context from a file. `Ok(false)` if not attached.
    async fn remove_usage_context(
        &self,
        file_id: FileId,
        context_id: UsageContextId,
    ) -> Result<bool, RepairError>;

    /// Usage contexts of a file in insertion order.
    async fn get_some_usage_contexts(
        &self,
        file_id: FileId,
    ) -> Result<Vec<UsageContextId>, RepairError>;

    /// Messages the file is known to appear in.
    async fn get_some_message_contexts(
        &self,
        file_id: FileId,
    ) -> Result<Vec<MessageFullId>, RepairError>;

    /// Request a fresh reference. Returns immediately; the ticket resolves
    /// once the repair finishes.
    fn repair(&self, file_id: FileId) -> RepairTicket;

    /// Merge `from` into `to`. Resolves once the merge has been applied.
    async fn merge(&self, to: FileId, from: FileId) -> Result<(), RepairError>;
}
