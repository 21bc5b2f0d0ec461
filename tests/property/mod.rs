//! Property-based tests for the reconnect executors.
//!
//! Run with: cargo test --test property_tests

pub mod streaming;

use futures::future::{BoxFuture, FutureExt};
use mt5_reconnect::{ConnectError, SessionManager};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Session manager that always succeeds and counts its connects.
#[derive(Default)]
pub struct CountingManager {
    connects: AtomicUsize,
}

impl CountingManager {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl SessionManager for CountingManager {
    fn connect(
        &self,
        _deadline: Option<tokio::time::Instant>,
    ) -> BoxFuture<'_, Result<String, ConnectError>> {
        async move {
            let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("instance-{}", n))
        }
        .boxed()
    }
}
