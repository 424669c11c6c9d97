//! # Application Layer
//!
//! The repair engine task and the handle used to drive it.

pub mod service;

pub use service::{
    FileReferenceHandle, FileReferenceService, RepairStats, RepairStatsSnapshot, RepairTicket,
};
