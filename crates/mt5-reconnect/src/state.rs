//! Connection state tracking for a session.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// The current context was accepted by the terminal.
    Connected,

    /// The last reconnect failed; calls still use the previous context.
    Disconnected,

    /// A reconnect is in progress.
    Reconnecting,
}

/// Counters and state of a session, readable without locking the context.
#[derive(Debug)]
pub struct ReconnectState {
    state: AtomicU8,
    reconnects: AtomicU64,
    failed_reconnects: AtomicU64,
    last_connected: Mutex<Option<Instant>>,
}

impl ReconnectState {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(Self::encode(ConnectionState::Disconnected)),
            reconnects: AtomicU64::new(0),
            failed_reconnects: AtomicU64::new(0),
            last_connected: Mutex::new(None),
        }
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        Self::decode(self.state.load(Ordering::Acquire))
    }

    /// Number of successful reconnects since the session was created.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Acquire)
    }

    /// Number of reconnects that failed.
    pub fn failed_reconnects(&self) -> u64 {
        self.failed_reconnects.load(Ordering::Acquire)
    }

    /// Time since the session was last (re)connected.
    pub fn time_since_connected(&self) -> Option<Duration> {
        let last = *self.last_connected.lock();
        last.map(|at| at.elapsed())
    }

    pub(crate) fn mark_connected(&self) {
        *self.last_connected.lock() = Some(Instant::now());
        self.set(ConnectionState::Connected);
    }

    /// Enters `Reconnecting`. Dropping the guard without settling it puts the
    /// previous state back.
    pub(crate) fn mark_reconnecting(&self) -> ReconnectingGuard<'_> {
        let previous = self
            .state
            .swap(Self::encode(ConnectionState::Reconnecting), Ordering::AcqRel);
        ReconnectingGuard {
            state: self,
            previous: Some(Self::decode(previous)),
        }
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::AcqRel);
        self.mark_connected();
    }

    pub(crate) fn record_failure(&self) {
        self.failed_reconnects.fetch_add(1, Ordering::AcqRel);
        self.set(ConnectionState::Disconnected);
    }

    fn set(&self, state: ConnectionState) {
        self.state.store(Self::encode(state), Ordering::Release);
    }

    fn encode(state: ConnectionState) -> u8 {
        match state {
            ConnectionState::Connected => 0,
            ConnectionState::Disconnected => 1,
            ConnectionState::Reconnecting => 2,
        }
    }

    fn decode(encoded: u8) -> ConnectionState {
        match encoded {
            0 => ConnectionState::Connected,
            1 => ConnectionState::Disconnected,
            _ => ConnectionState::Reconnecting,
        }
    }
}

/// An in-flight reconnect; see [`ReconnectState::mark_reconnecting`].
pub(crate) struct ReconnectingGuard<'a> {
    state: &'a ReconnectState,
    previous: Option<ConnectionState>,
}

impl ReconnectingGuard<'_> {
    pub(crate) fn reconnected(mut self) {
        self.previous = None;
        self.state.record_reconnect();
    }

    pub(crate) fn failed(mut self) {
        self.previous = None;
        self.state.record_failure();
    }
}

impl Drop for ReconnectingGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.state.set(previous);
        }
    }
}
