//! # Repair Engine Configuration

use serde::{Deserialize, Serialize};

/// Minimum delay between two successful repairs of the same file.
pub const DEFAULT_REPAIR_COOLDOWN_MS: u64 = 60_000;

/// Upper bound on a single resolver lookup.
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 30_000;

/// Repair engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// A file repaired successfully less than this long ago is not looked up
    /// again; its repair requests fail with `RecentlyRepaired`. Zero disables
    /// the cooldown.
    pub repair_cooldown_ms: u64,

    /// Resolver lookups running longer than this count as failed.
    pub lookup_timeout_ms: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            repair_cooldown_ms: DEFAULT_REPAIR_COOLDOWN_MS,
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
        }
    }
}

impl RepairConfig {
    /// Create a config for testing (no cooldown, short timeout).
    pub fn for_testing() -> Self {
        Self {
            repair_cooldown_ms: 0,
            lookup_timeout_ms: 5_000,
        }
    }
}
