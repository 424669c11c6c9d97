//! # Domain Module
//!
//! Core types of the repair engine: identifiers, usage contexts, the
//! append-only context store, and the node/query records of the node table.

pub mod context_set;
pub mod context_store;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod reference_error;
pub mod usage_context;
pub mod value_objects;

pub use context_set::*;
pub use context_store::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use reference_error::*;
pub use usage_context::*;
pub use value_objects::*;
