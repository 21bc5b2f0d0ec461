//! Stress tests for the reconnect executors
//!
//! ## What We Test
//!
//! - **High volume**: hundreds of thousands of calls and stream items
//! - **High concurrency**: thousands of calls failing on the same session
//! - **State consistency**: one reconnect per lost session, no matter how many callers notice
//! - **Resource cleanup**: no panics, deadlocks, or leaked subscriptions

pub mod streaming;

use futures::future::{BoxFuture, FutureExt};
use mt5_reconnect::{ConnectError, SessionManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Utility: Track peak concurrent operations
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

/// Utility: session manager with a fixed connect latency
pub struct SlowManager {
    latency: Duration,
    connects: AtomicUsize,
    in_flight: Arc<ConcurrencyTracker>,
}

impl SlowManager {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            connects: AtomicUsize::new(0),
            in_flight: ConcurrencyTracker::new(),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Most connects ever running at once.
    pub fn peak_connects(&self) -> usize {
        self.in_flight.peak()
    }
}

impl SessionManager for SlowManager {
    fn connect(
        &self,
        _deadline: Option<tokio::time::Instant>,
    ) -> BoxFuture<'_, Result<String, ConnectError>> {
        async move {
            self.in_flight.enter();
            tokio::time::sleep(self.latency).await;
            self.in_flight.exit();
            let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("instance-{}", n))
        }
        .boxed()
    }
}
