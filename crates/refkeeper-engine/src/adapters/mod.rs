//! Adapters layer for the repair engine.
//!
//! Provides the binary codec for usage contexts.

pub mod persistence;

pub use persistence::{decode_context, encode_context, restore_store, save_store, SNAPSHOT_VERSION};
