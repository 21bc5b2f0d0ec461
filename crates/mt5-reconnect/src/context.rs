//! Connection context snapshots and per-call options.

use mt5_reconnect_core::CancellationSignal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Metadata key the terminal routes calls by.
pub const ROUTING_HEADER: &str = "id";

/// Routing metadata of one established session.
///
/// Contexts are immutable. A reconnect produces a new context with the next
/// generation; it never edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    instance_id: String,
    generation: u64,
    established_at: Instant,
}

impl ConnectionContext {
    pub(crate) fn new(instance_id: String, generation: u64) -> Self {
        Self {
            instance_id,
            generation,
            established_at: Instant::now(),
        }
    }

    /// Terminal instance id used to stamp calls.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Number of successful reconnects that preceded this context.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When this context was established.
    pub fn established_at(&self) -> Instant {
        self.established_at
    }

    /// Routing pair to attach to outgoing calls.
    pub fn metadata(&self) -> (&'static str, &str) {
        (ROUTING_HEADER, &self.instance_id)
    }
}

/// What a single transport attempt gets to work with.
#[derive(Debug, Clone)]
pub struct CallContext {
    connection: Arc<ConnectionContext>,
    deadline: Option<Instant>,
    attempt: u32,
}

impl CallContext {
    pub(crate) fn new(
        connection: Arc<ConnectionContext>,
        deadline: Option<Instant>,
        attempt: u32,
    ) -> Self {
        Self {
            connection,
            deadline,
            attempt,
        }
    }

    /// Context snapshot this attempt runs against.
    pub fn connection(&self) -> &ConnectionContext {
        &self.connection
    }

    /// Shorthand for `connection().instance_id()`.
    pub fn instance_id(&self) -> &str {
        self.connection.instance_id()
    }

    /// Effective deadline of this attempt.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 1-based attempt number within the call.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Per-call deadline and cancellation.
///
/// ```
/// use std::time::Duration;
/// use mt5_reconnect::{CallOptions, CancellationSignal};
///
/// let signal = CancellationSignal::new();
/// let options = CallOptions::new()
///     .with_timeout(Duration::from_secs(3))
///     .with_cancellation(signal.clone());
/// assert!(!options.is_cancelled());
/// signal.cancel();
/// assert!(options.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    deadline: Option<Instant>,
    cancellation: Option<CancellationSignal>,
}

impl CallOptions {
    /// Options with no deadline and no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an absolute deadline for each transport attempt and reconnect.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attaches a cancellation signal.
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = Some(signal);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> Option<&CancellationSignal> {
        self.cancellation.as_ref()
    }

    /// Returns `true` if a signal is attached and set.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationSignal::is_cancelled)
    }
}
