//! Shared harness for the end-to-end scenarios
//!
//! Builds a fully wired engine over the in-memory store with a controllable
//! logical clock, so decay scenarios advance time without sleeping.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engram_core::reasoning::StreamContext;
use engram_core::{
    CallScope, EngineConfig, HashEmbedder, InMemoryStore, Orchestrator, ReasoningInput,
    ReasoningStream, StoreInput, StreamKind,
};

// ============================================================================
// LOGICAL CLOCK
// ============================================================================

/// A logical clock the tests advance by hand
#[derive(Clone)]
pub struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    /// Start at the real current time
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Utc::now())))
    }

    /// Current logical time
    pub fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }

    /// Advance by whole hours
    pub fn advance_hours(&self, hours: i64) {
        let mut now = self.0.lock().unwrap();
        *now = *now + chrono::Duration::hours(hours);
    }

    /// Advance by whole days
    pub fn advance_days(&self, days: i64) {
        let mut now = self.0.lock().unwrap();
        *now = *now + chrono::Duration::days(days);
    }
}

// ============================================================================
// ENGINE FIXTURE
// ============================================================================

/// A wired engine plus handles to its store and clock
pub struct Fixture {
    pub engine: Orchestrator,
    pub store: Arc<InMemoryStore>,
    pub clock: TestClock,
}

/// Build an engine over the in-memory store with default config
pub fn fixture() -> Fixture {
    fixture_with_config(EngineConfig::default())
}

/// Build an engine with a custom config
pub fn fixture_with_config(config: EngineConfig) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let clock = TestClock::new();
    let clock_handle = clock.clone();
    let engine = Orchestrator::new(config, store.clone(), Arc::new(HashEmbedder::new(64)))
        .unwrap()
        .with_clock(move || clock_handle.now());
    Fixture {
        engine,
        store,
        clock,
    }
}

/// Store a memory with defaults and return its id
pub async fn store(fixture: &Fixture, tenant: &str, content: &str) -> String {
    fixture
        .engine
        .store_memory(
            &CallScope::tenant(tenant),
            StoreInput {
                content: content.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .id
}

// ============================================================================
// REASONING TEST STREAMS
// ============================================================================

/// Wraps a stream with an artificial startup latency
pub struct SlowStream<S> {
    pub inner: S,
    pub delay: Duration,
}

#[async_trait]
impl<S: ReasoningStream> ReasoningStream for SlowStream<S> {
    fn kind(&self) -> StreamKind {
        self.inner.kind()
    }

    async fn run(
        &self,
        input: &ReasoningInput,
        ctx: &mut StreamContext,
    ) -> engram_core::Result<f64> {
        tokio::time::sleep(self.delay).await;
        self.inner.run(input, ctx).await
    }
}
