//! # Ports Module
//!
//! Hexagonal architecture ports:
//! - Inbound: API the engine offers (`FileReferenceApi`)
//! - Outbound: what the engine needs (`SourceResolver`, `TimeSource`)

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
