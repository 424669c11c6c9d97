//! # Algorithms
//!
//! - `repair` - node table and repair protocol (dispatch, fallback, forwarding)
//! - `merge` - unification of two file nodes

pub mod merge;
pub mod repair;

pub use repair::{Dispatch, RepairCoordinator, ResultDelivery};
