//! # Test Fixtures
//!
//! A running engine wired to a [`ControlledSourceResolver`] so tests decide
//! when and how each lookup finishes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use refkeeper_engine::{
    ControlledSourceResolver, FileReferenceHandle, FileReferenceService, MockTimeSource,
    PendingLookup, RepairConfig, UsageContextStore,
};

/// How long a test waits for the engine before giving up.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(2);

/// Engine under test.
pub struct TestEngine {
    /// Handle to the running service.
    pub handle: FileReferenceHandle,
    /// Lookups issued by the engine, in dispatch order.
    pub lookups: mpsc::UnboundedReceiver<PendingLookup>,
    /// Engine clock.
    pub clock: Arc<MockTimeSource>,
}

impl TestEngine {
    /// Engine without repair cooldown.
    pub fn start() -> Self {
        Self::with_config(RepairConfig::for_testing())
    }

    /// Engine with a custom configuration.
    pub fn with_config(config: RepairConfig) -> Self {
        init_test_tracing();
        let (resolver, lookups) = ControlledSourceResolver::new();
        let clock = Arc::new(MockTimeSource::new(1_000));
        let handle = FileReferenceService::spawn(
            config,
            Arc::new(UsageContextStore::new()),
            Arc::new(resolver),
            clock.clone(),
        );
        Self {
            handle,
            lookups,
            clock,
        }
    }

    /// Next lookup issued by the engine.
    pub async fn next_lookup(&mut self) -> PendingLookup {
        timeout(STEP_TIMEOUT, self.lookups.recv())
            .await
            .expect("timed out waiting for a lookup")
            .expect("resolver dropped")
    }

    /// True if the engine has not issued another lookup.
    pub fn no_pending_lookup(&mut self) -> bool {
        self.lookups.try_recv().is_err()
    }

    /// Wait until `condition` holds for the engine's counters.
    pub async fn wait_for(&self, condition: impl Fn(&FileReferenceHandle) -> bool) {
        timeout(STEP_TIMEOUT, async {
            while !condition(&self.handle) {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }
}

/// Route engine logs to the test output; `RUST_LOG` selects the level.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
