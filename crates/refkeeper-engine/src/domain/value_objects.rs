//! # Value Objects
//!
//! Identifiers used by the repair engine. All of them are plain `Copy`
//! newtypes; the engine never interprets their numeric value beyond
//! equality, hashing and (for [`UsageContextId`]) allocation order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp in milliseconds.
pub type Timestamp = u64;

/// Query generation stamp.
///
/// Allocated from a single engine-wide counter, so generations are strictly
/// increasing per node as well.
pub type Generation = u64;

/// Stable identity of a remote file, supplied by the file-management layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// Index into the usage-context store.
///
/// Ids are assigned densely starting from 1 and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UsageContextId(u32);

impl UsageContextId {
    /// Build an id from its raw value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Zero is never handed out by the store.
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }

    /// Position of this id in the store's backing vector.
    pub(crate) fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl fmt::Display for UsageContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// User identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Basic group identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Channel / supergroup identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub i64);

/// Chat background identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackgroundId(pub i64);

/// Dialog a message lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId(pub i64);

/// Message identifier, unique within a dialog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// Globally unique message address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageFullId {
    /// Owning dialog.
    pub dialog_id: DialogId,
    /// Message within the dialog.
    pub message_id: MessageId,
}

impl MessageFullId {
    /// Create a new message address.
    pub fn new(dialog_id: DialogId, message_id: MessageId) -> Self {
        Self {
            dialog_id,
            message_id,
        }
    }
}

impl fmt::Display for MessageFullId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dialog_id.0, self.message_id.0)
    }
}

/// Where a query result must be delivered.
///
/// Resolver calls carry the destination of the query that issued them; proxy
/// queries carry the destination they forward to. A destination only matches
/// while `generation` equals the generation of the node's current query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Destination {
    /// Node owning the query.
    pub node_id: FileId,
    /// Generation of the query when the destination was captured.
    pub generation: Generation,
}

impl Destination {
    /// Create a destination.
    pub fn new(node_id: FileId, generation: Generation) -> Self {
        Self {
            node_id,
            generation,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@g{}", self.node_id, self.generation)
    }
}
