//! # Usage-Context Persistence
//!
//! Stable binary encoding of usage contexts.
//!
//! ## Formats
//!
//! | Operation | Layout |
//! |-----------|--------|
//! | `encode_context` | bincode(`UsageContext`) |
//! | `save_store` | \[MAGIC\]\[VERSION\] bincode(`Vec<UsageContext>`) in id order |
//!
//! Ids are never written. A single decoded context gets whatever id the
//! store hands out; a restored store hands out the same ids as the saved one
//! because ids are positions.

use tracing::debug;

use crate::domain::{PersistenceError, UsageContextId, UsageContextStore};

/// Magic bytes of a store snapshot.
const SNAPSHOT_MAGIC: &[u8; 7] = b"RKUCTX\x00";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Encode one registered context.
pub fn encode_context(
    store: &UsageContextStore,
    id: UsageContextId,
) -> Result<Vec<u8>, PersistenceError> {
    let context = store
        .get(id)
        .ok_or(PersistenceError::UnknownContext(id))?;
    Ok(bincode::serialize(&context)?)
}

/// Decode a context and register it in `store`.
///
/// Keyed contexts resolve to their existing id; message contexts always get a
/// new one.
pub fn decode_context(
    store: &UsageContextStore,
    bytes: &[u8],
) -> Result<UsageContextId, PersistenceError> {
    let context = bincode::deserialize(bytes)?;
    Ok(store.register(context))
}

/// Snapshot the whole store.
pub fn save_store(store: &UsageContextStore) -> Result<Vec<u8>, PersistenceError> {
    let contexts = store.snapshot();
    let payload = bincode::serialize(&contexts)?;

    let mut buf = Vec::with_capacity(SNAPSHOT_MAGIC.len() + 1 + payload.len());
    buf.extend_from_slice(SNAPSHOT_MAGIC);
    buf.push(SNAPSHOT_VERSION);
    buf.extend_from_slice(&payload);

    debug!(contexts = contexts.len(), bytes = buf.len(), "Saved usage-context store");
    Ok(buf)
}

/// Rebuild a store from [`save_store`] output.
pub fn restore_store(bytes: &[u8]) -> Result<UsageContextStore, PersistenceError> {
    let body = bytes
        .strip_prefix(SNAPSHOT_MAGIC.as_slice())
        .ok_or(PersistenceError::BadMagic)?;
    let (&version, payload) = body.split_first().ok_or(PersistenceError::BadMagic)?;
    if version != SNAPSHOT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(version));
    }

    let contexts = bincode::deserialize(payload)?;
    let store = UsageContextStore::from_contexts(contexts);
    debug!(contexts = store.len(), "Restored usage-context store");
    Ok(store)
}
